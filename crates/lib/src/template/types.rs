use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde_yaml::{Mapping, Value};

use super::TemplateError;
use crate::consts::{STACK_RESOURCE_TYPE, TEMPLATE_URL_PROPERTY};

const FORMAT_VERSION_KEY: &str = "AWSTemplateFormatVersion";
const DESCRIPTION_KEY: &str = "Description";
const RESOURCES_KEY: &str = "Resources";
const TYPE_KEY: &str = "Type";
const PROPERTIES_KEY: &str = "Properties";

/// One declared infrastructure object.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
  /// Hierarchical type tag, e.g. `AWS::ECS::Service`.
  pub resource_type: String,

  /// Opaque properties payload.
  pub properties: Option<Value>,

  /// Every other key of the declaration (`DependsOn`, `Condition`, ...), in source order.
  pub attributes: Mapping,
}

impl Resource {
  pub fn new(resource_type: impl Into<String>) -> Self {
    Self {
      resource_type: resource_type.into(),
      properties: None,
      attributes: Mapping::new(),
    }
  }

  pub fn with_properties(mut self, properties: Value) -> Self {
    self.properties = Some(properties);
    self
  }

  /// A stack reference whose location has not been filled in yet.
  pub fn stack_reference() -> Self {
    Self::new(STACK_RESOURCE_TYPE).with_properties(Value::Mapping(Mapping::new()))
  }

  pub fn is_stack_reference(&self) -> bool {
    self.resource_type == STACK_RESOURCE_TYPE
  }

  /// Location of the nested template, for stack references that have one.
  pub fn template_url(&self) -> Option<&str> {
    self.properties.as_ref()?.get(TEMPLATE_URL_PROPERTY)?.as_str()
  }

  /// Point this stack reference at a nested template location.
  pub fn set_template_url(&mut self, url: &str) {
    let key = Value::from(TEMPLATE_URL_PROPERTY);
    match self.properties {
      Some(Value::Mapping(ref mut properties)) => {
        properties.insert(key, Value::from(url));
      }
      _ => {
        let mut properties = Mapping::new();
        properties.insert(key, Value::from(url));
        self.properties = Some(Value::Mapping(properties));
      }
    }
  }

  fn from_value(name: &str, value: Value) -> Result<Self, TemplateError> {
    let invalid = |reason: &str| TemplateError::InvalidResource {
      name: name.to_string(),
      reason: reason.to_string(),
    };

    let Value::Mapping(mapping) = value else {
      return Err(invalid("expected a mapping"));
    };

    let mut resource_type = None;
    let mut properties = None;
    let mut attributes = Mapping::new();

    for (key, value) in mapping {
      if key.as_str() == Some(TYPE_KEY) {
        match value {
          Value::String(tag) if !tag.trim().is_empty() => resource_type = Some(tag),
          _ => return Err(invalid("`Type` must be a non-empty string")),
        }
      } else if key.as_str() == Some(PROPERTIES_KEY) {
        properties = Some(value);
      } else {
        attributes.insert(key, value);
      }
    }

    let resource_type = resource_type.ok_or_else(|| invalid("missing `Type`"))?;

    Ok(Self {
      resource_type,
      properties,
      attributes,
    })
  }

  fn to_value(&self) -> Value {
    let mut mapping = Mapping::new();
    mapping.insert(Value::from(TYPE_KEY), Value::from(self.resource_type.as_str()));
    if let Some(properties) = &self.properties {
      mapping.insert(Value::from(PROPERTIES_KEY), properties.clone());
    }
    for (key, value) in &self.attributes {
      mapping.insert(key.clone(), value.clone());
    }
    Value::Mapping(mapping)
  }
}

/// A template document: metadata, resources and pass-through sections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Template {
  /// `AWSTemplateFormatVersion`, propagated to nested templates. Kept as
  /// written, so a numeric value is re-emitted as a number.
  pub format_version: Option<Value>,

  /// `Description`, propagated to nested templates.
  pub description: Option<Value>,

  /// Resources keyed by their logical name.
  pub resources: BTreeMap<String, Resource>,

  /// Remaining top-level sections (`Parameters`, `Outputs`, ...), kept on the root only.
  pub sections: Mapping,
}

impl Template {
  /// Parse a YAML (or JSON) template document.
  ///
  /// An empty document parses to an empty template; rejecting it is the
  /// caller's decision.
  pub fn from_yaml(content: &str) -> Result<Self, TemplateError> {
    let value: Value = serde_yaml::from_str(content).map_err(TemplateError::Parse)?;

    let root = match value {
      Value::Null => return Ok(Self::default()),
      Value::Mapping(root) => root,
      _ => return Err(TemplateError::NotAMapping),
    };

    let mut template = Self::default();

    for (key, value) in root {
      if key.as_str() == Some(FORMAT_VERSION_KEY) {
        template.format_version = Some(scalar(FORMAT_VERSION_KEY, value)?);
      } else if key.as_str() == Some(DESCRIPTION_KEY) {
        template.description = Some(scalar(DESCRIPTION_KEY, value)?);
      } else if key.as_str() == Some(RESOURCES_KEY) {
        template.resources = parse_resources(value)?;
      } else {
        template.sections.insert(key, value);
      }
    }

    Ok(template)
  }

  pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, TemplateError> {
    let mut content = String::new();
    reader.read_to_string(&mut content).map_err(TemplateError::Read)?;
    Self::from_yaml(&content)
  }

  pub fn from_path(path: &Path) -> Result<Self, TemplateError> {
    let content = std::fs::read_to_string(path).map_err(TemplateError::Read)?;
    Self::from_yaml(&content)
  }

  /// Render the template as a YAML document.
  pub fn to_yaml(&self) -> Result<String, TemplateError> {
    serde_yaml::to_string(&self.to_value()).map_err(TemplateError::Serialize)
  }

  pub fn to_value(&self) -> Value {
    let mut root = Mapping::new();

    if let Some(version) = &self.format_version {
      root.insert(Value::from(FORMAT_VERSION_KEY), version.clone());
    }
    if let Some(description) = &self.description {
      root.insert(Value::from(DESCRIPTION_KEY), description.clone());
    }

    let mut resources = Mapping::new();
    for (name, resource) in &self.resources {
      resources.insert(Value::from(name.as_str()), resource.to_value());
    }
    root.insert(Value::from(RESOURCES_KEY), Value::Mapping(resources));

    for (key, value) in &self.sections {
      root.insert(key.clone(), value.clone());
    }

    Value::Mapping(root)
  }

  /// An empty template carrying this template's format version and description.
  pub fn nested(&self) -> Self {
    Self {
      format_version: self.format_version.clone(),
      description: self.description.clone(),
      resources: BTreeMap::new(),
      sections: Mapping::new(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.resources.is_empty()
  }

  pub fn len(&self) -> usize {
    self.resources.len()
  }

  /// Names of the stack references declared in this template.
  pub fn stack_references(&self) -> impl Iterator<Item = (&String, &Resource)> {
    self.resources.iter().filter(|(_, resource)| resource.is_stack_reference())
  }
}

fn scalar(section: &str, value: Value) -> Result<Value, TemplateError> {
  match value {
    Value::String(_) | Value::Number(_) => Ok(value),
    _ => Err(TemplateError::InvalidSection {
      section: section.to_string(),
      reason: "expected a string".to_string(),
    }),
  }
}

fn parse_resources(value: Value) -> Result<BTreeMap<String, Resource>, TemplateError> {
  let mapping = match value {
    Value::Null => return Ok(BTreeMap::new()),
    Value::Mapping(mapping) => mapping,
    _ => {
      return Err(TemplateError::InvalidSection {
        section: RESOURCES_KEY.to_string(),
        reason: "expected a mapping of resource names to declarations".to_string(),
      });
    }
  };

  let mut resources = BTreeMap::new();
  for (key, value) in mapping {
    let Value::String(name) = key else {
      return Err(TemplateError::InvalidSection {
        section: RESOURCES_KEY.to_string(),
        reason: "resource names must be strings".to_string(),
      });
    };
    let resource = Resource::from_value(&name, value)?;
    resources.insert(name, resource);
  }

  Ok(resources)
}
