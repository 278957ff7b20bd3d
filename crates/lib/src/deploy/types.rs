//! Error, outcome and phase types for deployment attempts.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::service::{ServiceError, StackName};
use crate::split::SplitError;
use crate::staging::{ReleaseReport, StagingError};
use crate::store::{ContainerId, ObjectLocation};

/// Input rejected before anything is created.
#[derive(Debug, Error)]
pub enum InputError {
  #[error("stack name is required")]
  MissingStackName,

  #[error("invalid stack name {0:?}: use letters, digits, '-' and '_'")]
  InvalidStackName(String),

  #[error("template declares no resources")]
  EmptyTemplate,
}

/// Errors that end a deployment attempt.
///
/// Every variant other than `Input` is returned only after staged artifacts
/// have been released.
#[derive(Debug, Error)]
pub enum DeployError {
  #[error(transparent)]
  Input(#[from] InputError),

  #[error("split failed: {0}")]
  Split(#[from] SplitError),

  #[error("staging failed: {0}")]
  Staging(#[from] StagingError),

  /// The stack lookup failed for a reason other than the stack being absent.
  #[error("failed to query stack state: {0}")]
  Query(#[source] ServiceError),

  /// The change proposal failed; carries the service's reason verbatim.
  #[error("{reason}")]
  ProposalRejected { reason: String },

  #[error("change proposal {name} still pending after {attempts} status checks")]
  ProposalTimeout { name: String, attempts: u32 },

  #[error("deployment call failed: {0}")]
  Deployment(#[source] ServiceError),

  #[error("deployment attempt timed out after {0:?}")]
  TimedOut(Duration),

  #[error("deployment attempt cancelled")]
  Cancelled,
}

/// Which branch an attempt took against the deployment service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployAction {
  /// The stack was absent and has been created.
  Created,
  /// The stack existed and the named change proposal was executed.
  Updated { proposal: String },
}

/// Result of a successful deployment attempt.
#[derive(Debug)]
pub struct DeployOutcome {
  pub stack_name: StackName,

  pub action: DeployAction,

  /// Staging container used by the attempt (removed by the time this is returned).
  pub container: ContainerId,

  /// Where the root template was staged.
  pub root_location: ObjectLocation,

  /// Number of nested templates the root was split into.
  pub nested_templates: usize,

  /// What cleanup released.
  pub release: ReleaseReport,

  pub elapsed: Duration,
}

/// Progress of a deployment attempt, recorded for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  ContainerCreated,
  Staged,
  DeploymentQueried,
  CreatePath,
  UpdatePath,
  Done,
}

impl Phase {
  pub fn as_str(&self) -> &'static str {
    match self {
      Phase::ContainerCreated => "container_created",
      Phase::Staged => "staged",
      Phase::DeploymentQueried => "deployment_queried",
      Phase::CreatePath => "create_path",
      Phase::UpdatePath => "update_path",
      Phase::Done => "done",
    }
  }
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
