//! Directory-backed artifact store.
//!
//! # Storage Layout
//!
//! ```text
//! {root}/
//! └── <container>/            # one directory per staging container
//!     ├── template.yaml
//!     └── template.<Key>.yaml
//! ```

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::trace;

use super::{ArtifactStore, ContainerId, ObjectLocation, StoreError, validate_key};

/// Directory name for staging containers within the state directory.
const ARTIFACTS_DIR: &str = "artifacts";

/// Suffix of a write that has not been renamed into place yet.
const PARTIAL_WRITE_SUFFIX: &str = ".tmp";

/// Temp file a put of `key` writes before renaming. Never a valid key itself.
fn partial_write_name(key: &str) -> String {
  format!(".{}{}", key, PARTIAL_WRITE_SUFFIX)
}

fn is_partial_write(name: &str) -> bool {
  name.starts_with('.') && name.ends_with(PARTIAL_WRITE_SUFFIX)
}

async fn remove_if_present(path: &Path) -> Result<(), StoreError> {
  match fs::remove_file(path).await {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(StoreError::Io(e)),
  }
}

/// Stores objects as files, one directory per container.
///
/// Writes go to a temp file first and are renamed into place, so a reader
/// never sees a partially written template. Temp files left by an interrupted
/// write are removed by `delete` and `delete_container`.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
  root: PathBuf,
}

impl LocalArtifactStore {
  pub fn new(root: PathBuf) -> Self {
    Self { root }
  }

  /// Store under `<state>/artifacts`.
  pub fn in_state_dir(state: &Path) -> Self {
    Self::new(state.join(ARTIFACTS_DIR))
  }

  pub fn root(&self) -> &PathBuf {
    &self.root
  }

  fn container_path(&self, container: &ContainerId) -> PathBuf {
    self.root.join(container.as_str())
  }

  async fn require_container(&self, container: &ContainerId) -> Result<PathBuf, StoreError> {
    let path = self.container_path(container);
    match fs::metadata(&path).await {
      Ok(meta) if meta.is_dir() => Ok(path),
      Ok(_) => Err(StoreError::ContainerNotFound(container.clone())),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::ContainerNotFound(container.clone())),
      Err(e) => Err(StoreError::Io(e)),
    }
  }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
  async fn create_container(&self, container: &ContainerId) -> Result<(), StoreError> {
    fs::create_dir_all(&self.root).await?;

    match fs::create_dir(self.container_path(container)).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(StoreError::ContainerExists(container.clone())),
      Err(e) => Err(StoreError::Io(e)),
    }
  }

  async fn delete_container(&self, container: &ContainerId) -> Result<(), StoreError> {
    let path = self.container_path(container);

    let mut entries = match fs::read_dir(&path).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StoreError::ContainerNotFound(container.clone())),
      Err(e) => return Err(StoreError::Io(e)),
    };
    while let Some(entry) = entries.next_entry().await? {
      if entry.file_name().to_str().is_some_and(is_partial_write) {
        trace!(path = %entry.path().display(), "removing partial write");
        remove_if_present(&entry.path()).await?;
      }
    }

    match fs::remove_dir(&path).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::ContainerNotFound(container.clone())),
      Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => {
        Err(StoreError::ContainerNotEmpty(container.clone()))
      }
      Err(e) => Err(StoreError::Io(e)),
    }
  }

  async fn put(&self, container: &ContainerId, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError> {
    validate_key(key)?;
    let dir = self.require_container(container).await?;

    let path = dir.join(key);
    let temp_path = dir.join(partial_write_name(key));

    if let Err(e) = fs::write(&temp_path, &body).await {
      let _ = fs::remove_file(&temp_path).await;
      return Err(StoreError::Io(e));
    }
    fs::rename(&temp_path, &path).await?;

    trace!(path = %path.display(), bytes = body.len(), content_type, "object written");
    Ok(())
  }

  async fn delete(&self, container: &ContainerId, key: &str) -> Result<(), StoreError> {
    validate_key(key)?;
    let dir = self.container_path(container);

    remove_if_present(&dir.join(partial_write_name(key))).await?;
    remove_if_present(&dir.join(key)).await
  }

  fn location(&self, container: &ContainerId, key: &str) -> ObjectLocation {
    ObjectLocation(format!("file://{}", self.container_path(container).join(key).display()))
  }
}
