//! Artifact store abstraction.
//!
//! Durable object storage that templates are staged in before the deployment
//! service reads them. Objects live in containers; each deployment attempt
//! creates its own container and removes it again when it is done.
//!
//! Two backends ship with the crate:
//! - [`LocalArtifactStore`]: one directory per container, `file://` locations
//! - [`MemoryArtifactStore`]: process-local, `memory://` locations

mod local;
mod memory;

use std::fmt;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use local::LocalArtifactStore;
pub use memory::MemoryArtifactStore;

/// Name of a staging container.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub String);

impl ContainerId {
  /// A fresh container name of the form `<prefix>.<random-id>`.
  pub fn generate(prefix: &str) -> Self {
    Self(format!("{}.{}", prefix, Uuid::new_v4().simple()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ContainerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Where an uploaded object can be read from (a URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation(pub String);

impl ObjectLocation {
  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Filesystem path for `file://` locations.
  pub fn to_file_path(&self) -> Option<PathBuf> {
    self.0.strip_prefix("file://").map(PathBuf::from)
  }
}

impl fmt::Display for ObjectLocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Errors returned by artifact store backends.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("container not found: {0}")]
  ContainerNotFound(ContainerId),

  #[error("container already exists: {0}")]
  ContainerExists(ContainerId),

  #[error("container is not empty: {0}")]
  ContainerNotEmpty(ContainerId),

  #[error("invalid object key: {0:?}")]
  InvalidKey(String),

  #[error("io error: {0}")]
  Io(#[from] io::Error),

  /// Failure reported by a remote backend.
  #[error("{0}")]
  Backend(String),
}

/// Object storage used to stage templates.
///
/// `delete` must succeed when the object is already gone so that releasing
/// staged artifacts can be repeated safely.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
  /// Create a new, empty container. Fails if it already exists.
  async fn create_container(&self, container: &ContainerId) -> Result<(), StoreError>;

  /// Remove an empty container.
  async fn delete_container(&self, container: &ContainerId) -> Result<(), StoreError>;

  /// Write an object, replacing any previous content under the same key.
  async fn put(&self, container: &ContainerId, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError>;

  /// Remove an object. Removing a missing object succeeds.
  async fn delete(&self, container: &ContainerId, key: &str) -> Result<(), StoreError>;

  /// The location an object is (or will be) readable from.
  fn location(&self, container: &ContainerId, key: &str) -> ObjectLocation;
}

/// Keys are flat names inside a container.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
  let valid = !key.is_empty()
    && !key.starts_with('.')
    && !key.contains(['/', '\\'])
    && key.chars().all(|c| !c.is_control());
  if valid {
    Ok(())
  } else {
    Err(StoreError::InvalidKey(key.to_string()))
  }
}
