//! Staging of split templates in the artifact store.
//!
//! A [`StagingArea`] owns one freshly created container for the lifetime of a
//! deployment attempt. Nested templates are uploaded first, concurrently, and
//! the root's stack references are pointed at their locations only after every
//! nested upload has finished. The root is uploaded last.
//!
//! Every object is entered into the release ledger *before* its upload is
//! issued, so a failed or interrupted upload is still deleted on release.
//! [`StagingArea::release_all`] waits for uploads still in flight, deletes the
//! ledger in reverse order and then the container. Release is best-effort: failures are logged and reported,
//! never returned as errors.

use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::consts::{ROOT_TEMPLATE_KEY, TEMPLATE_CONTENT_TYPE};
use crate::split::{PartitionKey, SplitTemplates};
use crate::store::{ArtifactStore, ContainerId, ObjectLocation, StoreError};
use crate::template::{Template, TemplateError};

/// Default bound on concurrent nested uploads.
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 4;

/// One object written (or about to be written) during an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
  pub key: String,
  pub location: ObjectLocation,
  pub size: usize,
}

/// Errors that can occur while staging templates.
#[derive(Debug, Error)]
pub enum StagingError {
  #[error("failed to create staging container {container}: {source}")]
  CreateContainer {
    container: ContainerId,
    #[source]
    source: StoreError,
  },

  #[error("failed to render {key}: {source}")]
  Render {
    key: String,
    #[source]
    source: TemplateError,
  },

  #[error("failed to upload {key}: {source}")]
  Upload {
    key: String,
    #[source]
    source: StoreError,
  },

  /// The root has no stack reference for a nested template it was split into.
  #[error("root template has no stack reference for partition {0}")]
  MissingStackReference(PartitionKey),

  #[error("upload task failed: {0}")]
  TaskFailed(String),

  #[error("staging area has already been released")]
  Released,
}

/// Locations of a fully staged template set.
#[derive(Debug, Clone)]
pub struct StagedTemplates {
  /// Where the root template can be read from.
  pub root_location: ObjectLocation,

  /// Where each nested template can be read from.
  pub nested: BTreeMap<PartitionKey, ObjectLocation>,

  /// The root as uploaded, stack references patched.
  pub root: Template,
}

/// What [`StagingArea::release_all`] managed to clean up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseReport {
  /// Keys deleted, in deletion order.
  pub deleted: Vec<String>,

  /// Keys that could not be deleted, with the error message.
  pub failed: Vec<(String, String)>,

  pub container_deleted: bool,
}

impl ReleaseReport {
  /// Whether every object and the container were removed.
  pub fn is_clean(&self) -> bool {
    self.failed.is_empty() && self.container_deleted
  }
}

/// Outcome of one spawned upload: the object key on success.
type UploadResult = Result<String, StagingError>;

/// A staging container owned by a single deployment attempt.
///
/// Uploads run as tasks owned by the area, so abandoning a `stage` call does
/// not cut them short. Release waits for them before deleting anything.
pub struct StagingArea {
  store: Arc<dyn ArtifactStore>,
  container: ContainerId,
  ledger: Vec<Artifact>,
  in_flight: JoinSet<UploadResult>,
  max_concurrent_uploads: usize,
  released: bool,
}

impl StagingArea {
  /// Create `container` in `store` and take ownership of it.
  ///
  /// Nothing needs releasing when this fails.
  pub async fn open(store: Arc<dyn ArtifactStore>, container: ContainerId) -> Result<Self, StagingError> {
    store
      .create_container(&container)
      .await
      .map_err(|source| StagingError::CreateContainer {
        container: container.clone(),
        source,
      })?;

    info!(container = %container, "created staging container");

    Ok(Self {
      store,
      container,
      ledger: Vec::new(),
      in_flight: JoinSet::new(),
      max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
      released: false,
    })
  }

  pub fn with_max_concurrent_uploads(mut self, limit: usize) -> Self {
    self.max_concurrent_uploads = limit.max(1);
    self
  }

  pub fn container(&self) -> &ContainerId {
    &self.container
  }

  /// Objects recorded for release, in upload order.
  pub fn artifacts(&self) -> &[Artifact] {
    &self.ledger
  }

  fn record(&mut self, key: &str, size: usize) -> ObjectLocation {
    let location = self.store.location(&self.container, key);
    self.ledger.push(Artifact {
      key: key.to_string(),
      location: location.clone(),
      size,
    });
    location
  }

  /// Upload the nested templates, patch the root and upload it.
  ///
  /// On error the objects staged so far stay in the ledger for release.
  pub async fn stage(&mut self, split: SplitTemplates) -> Result<StagedTemplates, StagingError> {
    if self.released {
      return Err(StagingError::Released);
    }

    let SplitTemplates { mut root, nested } = split;

    let mut rendered = Vec::with_capacity(nested.len());
    for (key, template) in &nested {
      let object_key = key.template_key();
      let body = render(&object_key, template)?;
      rendered.push((key.clone(), object_key, body));
    }

    let nested_locations = self.upload_nested(rendered).await?;

    for (key, location) in &nested_locations {
      let reference = root
        .resources
        .get_mut(&key.stack_resource_name())
        .filter(|resource| resource.is_stack_reference())
        .ok_or_else(|| StagingError::MissingStackReference(key.clone()))?;
      reference.set_template_url(location.as_str());
    }

    let body = render(ROOT_TEMPLATE_KEY, &root)?;
    let root_location = self.spawn_upload(ROOT_TEMPLATE_KEY.to_string(), body, None);
    self.join_uploads().await?;

    info!(
      container = %self.container,
      root = %root_location,
      nested = nested_locations.len(),
      "staged templates"
    );

    Ok(StagedTemplates {
      root_location,
      nested: nested_locations,
      root,
    })
  }

  /// Fan the nested uploads out and wait for all of them, even after one fails.
  async fn upload_nested(
    &mut self,
    rendered: Vec<(PartitionKey, String, Bytes)>,
  ) -> Result<BTreeMap<PartitionKey, ObjectLocation>, StagingError> {
    let semaphore = Arc::new(Semaphore::new(self.max_concurrent_uploads));
    let mut locations = BTreeMap::new();

    for (key, object_key, body) in rendered {
      let location = self.spawn_upload(object_key, body, Some(Arc::clone(&semaphore)));
      locations.insert(key, location);
    }

    self.join_uploads().await?;
    Ok(locations)
  }

  /// Record `object_key` in the ledger, then start its upload.
  fn spawn_upload(&mut self, object_key: String, body: Bytes, permits: Option<Arc<Semaphore>>) -> ObjectLocation {
    let location = self.record(&object_key, body.len());
    let store = Arc::clone(&self.store);
    let container = self.container.clone();

    self.in_flight.spawn(async move {
      let _permit = match permits {
        Some(semaphore) => Some(
          semaphore
            .acquire_owned()
            .await
            .map_err(|e| StagingError::TaskFailed(e.to_string()))?,
        ),
        None => None,
      };

      debug!(key = %object_key, bytes = body.len(), "uploading template");
      store
        .put(&container, &object_key, body, TEMPLATE_CONTENT_TYPE)
        .await
        .map_err(|source| StagingError::Upload {
          key: object_key.clone(),
          source,
        })?;

      Ok(object_key)
    });

    location
  }

  /// Wait for every in-flight upload and surface the first failure.
  async fn join_uploads(&mut self) -> Result<(), StagingError> {
    let mut first_error = None;

    while let Some(join_result) = self.in_flight.join_next().await {
      let outcome = join_result.unwrap_or_else(|e| Err(StagingError::TaskFailed(e.to_string())));
      if let Err(e) = outcome {
        warn!(container = %self.container, error = %e, "upload failed");
        if first_error.is_none() {
          first_error = Some(e);
        }
      }
    }

    match first_error {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }

  /// Wait for in-flight uploads, delete every recorded object in reverse
  /// order, then the container.
  ///
  /// Safe to call more than once; later calls release nothing.
  pub async fn release_all(&mut self) -> ReleaseReport {
    if self.released {
      return ReleaseReport::default();
    }
    self.released = true;

    let ledger = mem::take(&mut self.ledger);
    let in_flight = mem::replace(&mut self.in_flight, JoinSet::new());
    release(self.store.as_ref(), &self.container, ledger, in_flight).await
  }
}

/// An area dropped before release (e.g. its attempt future was abandoned)
/// is released on a background task when a runtime is available.
impl Drop for StagingArea {
  fn drop(&mut self) {
    if self.released {
      return;
    }
    self.released = true;

    let ledger = mem::take(&mut self.ledger);
    let in_flight = mem::replace(&mut self.in_flight, JoinSet::new());

    match Handle::try_current() {
      Ok(handle) => {
        warn!(
          container = %self.container,
          artifacts = ledger.len(),
          "staging area dropped without release, releasing in background"
        );
        let store = Arc::clone(&self.store);
        let container = self.container.clone();
        handle.spawn(async move {
          release(store.as_ref(), &container, ledger, in_flight).await;
        });
      }
      Err(_) => {
        warn!(
          container = %self.container,
          artifacts = ledger.len(),
          "staging area dropped without release"
        );
      }
    }
  }
}

async fn release(
  store: &dyn ArtifactStore,
  container: &ContainerId,
  mut ledger: Vec<Artifact>,
  mut in_flight: JoinSet<UploadResult>,
) -> ReleaseReport {
  if !in_flight.is_empty() {
    debug!(container = %container, pending = in_flight.len(), "waiting for in-flight uploads");
    while in_flight.join_next().await.is_some() {}
  }

  let mut report = ReleaseReport::default();

  while let Some(artifact) = ledger.pop() {
    match store.delete(container, &artifact.key).await {
      Ok(()) => {
        debug!(key = %artifact.key, "released artifact");
        report.deleted.push(artifact.key);
      }
      Err(e) => {
        warn!(container = %container, key = %artifact.key, error = %e, "failed to release artifact");
        report.failed.push((artifact.key, e.to_string()));
      }
    }
  }

  match store.delete_container(container).await {
    Ok(()) => report.container_deleted = true,
    Err(e) => {
      warn!(container = %container, error = %e, "failed to delete staging container");
    }
  }

  info!(
    container = %container,
    deleted = report.deleted.len(),
    failed = report.failed.len(),
    container_deleted = report.container_deleted,
    "released staging area"
  );

  report
}

fn render(key: &str, template: &Template) -> Result<Bytes, StagingError> {
  template
    .to_yaml()
    .map(Bytes::from)
    .map_err(|source| StagingError::Render {
      key: key.to_string(),
      source,
    })
}
