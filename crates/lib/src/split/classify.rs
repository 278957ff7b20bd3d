//! Resource classification.
//!
//! A classifier maps a resource to the nested template group it belongs in,
//! or to `None` when it stays in the root. Classification only ever looks at
//! the type tag, so the same tag always lands in the same group.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::NESTED_STACK_SUFFIX;
use crate::template::Resource;

/// Resource types that weigh heaviest against the per-template resource limit.
pub const DEFAULT_HOT_TYPES: &[&str] = &[
  "AWS::ECS::Service",
  "AWS::ECS::TaskDefinition",
  "AWS::ServiceDiscovery::Service",
];

/// Identifier of a nested template group.
///
/// Derived from a type tag by dropping every character that is not an ASCII
/// letter or digit, e.g. `AWS::ECS::Service` becomes `AWSECSService`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionKey(String);

impl PartitionKey {
  /// Returns `None` when nothing alphanumeric is left of the tag.
  pub fn from_type_tag(type_tag: &str) -> Option<Self> {
    let key: String = type_tag.chars().filter(char::is_ascii_alphanumeric).collect();
    if key.is_empty() { None } else { Some(Self(key)) }
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Name of the stack reference inserted into the root for this group.
  pub fn stack_resource_name(&self) -> String {
    format!("{}{}", self.0, NESTED_STACK_SUFFIX)
  }

  /// Object key the nested template is uploaded under.
  pub fn template_key(&self) -> String {
    format!("template.{}.yaml", self.0)
  }
}

impl fmt::Display for PartitionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Maps a resource to its partition.
pub trait Classifier: Send + Sync {
  fn classify(&self, resource: &Resource) -> Option<PartitionKey>;
}

/// Moves a fixed set of resource types into one nested template per type.
#[derive(Debug, Clone)]
pub struct HotTypeClassifier {
  types: BTreeSet<String>,
}

impl HotTypeClassifier {
  pub fn new<I, S>(types: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      types: types.into_iter().map(Into::into).collect(),
    }
  }

  /// Add more hot types on top of the current set.
  pub fn extend<I, S>(mut self, types: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.types.extend(types.into_iter().map(Into::into));
    self
  }

  pub fn types(&self) -> impl Iterator<Item = &str> {
    self.types.iter().map(String::as_str)
  }
}

impl Default for HotTypeClassifier {
  fn default() -> Self {
    Self::new(DEFAULT_HOT_TYPES.iter().copied())
  }
}

impl Classifier for HotTypeClassifier {
  fn classify(&self, resource: &Resource) -> Option<PartitionKey> {
    if self.types.contains(&resource.resource_type) {
      PartitionKey::from_type_tag(&resource.resource_type)
    } else {
      None
    }
  }
}

/// One nested template per distinct type tag.
///
/// Stack references always stay in the root so existing nesting is not
/// pushed a level deeper.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerTypeClassifier;

impl Classifier for PerTypeClassifier {
  fn classify(&self, resource: &Resource) -> Option<PartitionKey> {
    if resource.is_stack_reference() {
      return None;
    }
    PartitionKey::from_type_tag(&resource.resource_type)
  }
}
