/// Application name used for config and data directories.
pub const APP_NAME: &str = "nestack";

/// Resource type of a stack reference pointing at a nested template.
pub const STACK_RESOURCE_TYPE: &str = "AWS::CloudFormation::Stack";

/// Property on a stack reference holding the nested template's location.
pub const TEMPLATE_URL_PROPERTY: &str = "TemplateURL";

/// Suffix appended to a partition key to name its stack reference.
pub const NESTED_STACK_SUFFIX: &str = "NestedStack";

/// Object key of the root template inside a staging container.
pub const ROOT_TEMPLATE_KEY: &str = "template.yaml";

/// Default prefix for staging container names.
pub const DEFAULT_CONTAINER_PREFIX: &str = "nestack.staging";

/// Content type attached to every uploaded template.
pub const TEMPLATE_CONTENT_TYPE: &str = "application/yaml";

/// Environment variable overriding the local state directory.
pub const HOME_ENV: &str = "NESTACK_HOME";
