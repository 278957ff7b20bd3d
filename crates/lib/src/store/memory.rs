//! In-memory artifact store for embedding and tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use super::{ArtifactStore, ContainerId, ObjectLocation, StoreError, validate_key};

#[derive(Debug, Clone)]
struct StoredObject {
  data: Bytes,
  content_type: String,
}

type Containers = HashMap<ContainerId, HashMap<String, StoredObject>>;

/// Process-local artifact store. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifactStore {
  containers: Arc<RwLock<Containers>>,
}

impl MemoryArtifactStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Read an object back.
  pub fn get(&self, container: &ContainerId, key: &str) -> Option<Bytes> {
    let containers = self.containers.read().ok()?;
    containers.get(container)?.get(key).map(|o| o.data.clone())
  }

  /// Content type the object was written with.
  pub fn content_type(&self, container: &ContainerId, key: &str) -> Option<String> {
    let containers = self.containers.read().ok()?;
    containers.get(container)?.get(key).map(|o| o.content_type.clone())
  }

  pub fn container_exists(&self, container: &ContainerId) -> bool {
    self
      .containers
      .read()
      .map(|c| c.contains_key(container))
      .unwrap_or(false)
  }

  /// Total number of objects across all containers.
  pub fn object_count(&self) -> usize {
    self
      .containers
      .read()
      .map(|c| c.values().map(HashMap::len).sum())
      .unwrap_or(0)
  }

  /// Number of containers that currently exist.
  pub fn container_count(&self) -> usize {
    self.containers.read().map(|c| c.len()).unwrap_or(0)
  }

  fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Containers>, StoreError> {
    self
      .containers
      .write()
      .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
  }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
  async fn create_container(&self, container: &ContainerId) -> Result<(), StoreError> {
    let mut containers = self.write()?;
    if containers.contains_key(container) {
      return Err(StoreError::ContainerExists(container.clone()));
    }
    containers.insert(container.clone(), HashMap::new());
    Ok(())
  }

  async fn delete_container(&self, container: &ContainerId) -> Result<(), StoreError> {
    let mut containers = self.write()?;
    match containers.get(container) {
      None => Err(StoreError::ContainerNotFound(container.clone())),
      Some(objects) if !objects.is_empty() => Err(StoreError::ContainerNotEmpty(container.clone())),
      Some(_) => {
        containers.remove(container);
        Ok(())
      }
    }
  }

  async fn put(&self, container: &ContainerId, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError> {
    validate_key(key)?;
    let mut containers = self.write()?;
    let objects = containers
      .get_mut(container)
      .ok_or_else(|| StoreError::ContainerNotFound(container.clone()))?;
    objects.insert(
      key.to_string(),
      StoredObject {
        data: body,
        content_type: content_type.to_string(),
      },
    );
    Ok(())
  }

  async fn delete(&self, container: &ContainerId, key: &str) -> Result<(), StoreError> {
    validate_key(key)?;
    let mut containers = self.write()?;
    if let Some(objects) = containers.get_mut(container) {
      objects.remove(key);
    }
    Ok(())
  }

  fn location(&self, container: &ContainerId, key: &str) -> ObjectLocation {
    ObjectLocation(format!("memory://{}/{}", container, key))
  }
}
