//! Template document model.
//!
//! A template is a named collection of resources plus a handful of top-level
//! sections. Only the fields the splitter needs are modelled; everything else
//! (resource attributes, `Parameters`, `Outputs`, intrinsic function tags such
//! as `!Ref`) is carried as opaque YAML and written back untouched.
//!
//! # Document Shape
//!
//! ```text
//! AWSTemplateFormatVersion: 2010-09-09   # propagated to nested templates
//! Description: ...                       # propagated to nested templates
//! Resources:
//!   <Name>:
//!     Type: <Vendor>::<Category>::<Kind>
//!     Properties: { ... }                 # opaque
//!     DependsOn: ...                      # opaque attribute
//! Outputs: ...                            # root only
//! ```
//!
//! Resource references (`!Ref Other`) are never rewritten. When two resources
//! that reference each other land in different templates the reference dangles;
//! resolving it would need cross-stack outputs, which this crate does not manage.

mod types;

use std::io;

use thiserror::Error;

pub use types::{Resource, Template};

/// Errors produced while reading or writing template documents.
#[derive(Debug, Error)]
pub enum TemplateError {
  /// The template source could not be read.
  #[error("failed to read template: {0}")]
  Read(#[source] io::Error),

  /// The document is not valid YAML (or JSON).
  #[error("failed to parse template: {0}")]
  Parse(#[source] serde_yaml::Error),

  /// The document could not be rendered back to YAML.
  #[error("failed to serialize template: {0}")]
  Serialize(#[source] serde_yaml::Error),

  /// The top level of the document is a scalar or a sequence.
  #[error("template must be a mapping at the top level")]
  NotAMapping,

  /// A known top-level section has the wrong shape.
  #[error("invalid `{section}` section: {reason}")]
  InvalidSection { section: String, reason: String },

  /// A resource declaration has the wrong shape.
  #[error("invalid resource `{name}`: {reason}")]
  InvalidResource { name: String, reason: String },
}
