//! Template splitting.
//!
//! Moves every classified resource out of the root template into a nested
//! template for its partition, and leaves a stack reference behind in the root
//! for each nested template produced. The stack references start without a
//! location; staging fills it in once the nested template has been uploaded.
//!
//! Splitting is pure and in-memory. Every input resource ends up in exactly
//! one output template, and there is exactly one stack reference per non-empty
//! partition.

mod classify;

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info};

use crate::template::{Resource, Template};

pub use classify::{Classifier, DEFAULT_HOT_TYPES, HotTypeClassifier, PartitionKey, PerTypeClassifier};

/// Errors that can occur while splitting a template.
#[derive(Debug, Error)]
pub enum SplitError {
  /// A resource that stays in the root already uses a stack reference's name.
  #[error("resource `{name}` collides with the stack reference for partition {key}")]
  NameCollision { name: String, key: PartitionKey },
}

/// Output of [`split`]: the trimmed root and one template per partition.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitTemplates {
  /// The root, with extracted resources replaced by stack references.
  pub root: Template,

  /// Nested templates keyed by partition. Never contains an empty template.
  pub nested: BTreeMap<PartitionKey, Template>,
}

impl SplitTemplates {
  /// Number of nested templates produced.
  pub fn nested_count(&self) -> usize {
    self.nested.len()
  }

  /// Number of resources across all templates, excluding inserted stack references.
  pub fn resource_count(&self) -> usize {
    let nested: usize = self.nested.values().map(Template::len).sum();
    self.root.len() - self.nested.len() + nested
  }
}

/// Split `root` according to `classifier`.
pub fn split(mut root: Template, classifier: &dyn Classifier) -> Result<SplitTemplates, SplitError> {
  let mut nested: BTreeMap<PartitionKey, Template> = BTreeMap::new();
  let mut kept = BTreeMap::new();

  for (name, resource) in std::mem::take(&mut root.resources) {
    match classifier.classify(&resource) {
      Some(key) => {
        debug!(resource = %name, resource_type = %resource.resource_type, partition = %key, "moving resource");
        nested
          .entry(key)
          .or_insert_with(|| root.nested())
          .resources
          .insert(name, resource);
      }
      None => {
        kept.insert(name, resource);
      }
    }
  }

  for key in nested.keys() {
    let reference_name = key.stack_resource_name();
    if kept.contains_key(&reference_name) {
      return Err(SplitError::NameCollision {
        name: reference_name,
        key: key.clone(),
      });
    }
    kept.insert(reference_name, Resource::stack_reference());
  }

  root.resources = kept;

  info!(
    root_resources = root.len(),
    nested_templates = nested.len(),
    "split template"
  );

  Ok(SplitTemplates { root, nested })
}
