//! Deployment service abstraction.
//!
//! The managed service that owns live stacks. A stack is either created from a
//! template location outright or updated through a change proposal, which the
//! service evaluates (`pending` → `ready` | `failed`) before it may be executed.

use std::fmt;
use std::io;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::InputError;
use crate::store::ObjectLocation;

/// Caller-supplied stack identity, stable across attempts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackName(String);

impl StackName {
  /// Stack names are ASCII letters, digits, `-` and `_`.
  pub fn new(name: impl Into<String>) -> Result<Self, InputError> {
    let name = name.into();
    let name = name.trim();
    if name.is_empty() {
      return Err(InputError::MissingStackName);
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
      return Err(InputError::InvalidStackName(name.to_string()));
    }
    Ok(Self(name.to_string()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for StackName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Service-assigned identity of a change proposal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalId(pub String);

impl fmt::Display for ProposalId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Acknowledgements the service requires before touching certain resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
  #[serde(rename = "CAPABILITY_IAM")]
  Iam,
  #[serde(rename = "CAPABILITY_NAMED_IAM")]
  NamedIam,
  #[serde(rename = "CAPABILITY_AUTO_EXPAND")]
  AutoExpand,
}

impl Capability {
  pub fn as_str(&self) -> &'static str {
    match self {
      Capability::Iam => "CAPABILITY_IAM",
      Capability::NamedIam => "CAPABILITY_NAMED_IAM",
      Capability::AutoExpand => "CAPABILITY_AUTO_EXPAND",
    }
  }
}

/// What the service does with a stack whose resources fail to provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailurePolicy {
  #[default]
  Rollback,
  Delete,
  DoNothing,
}

/// Request to create a stack that does not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
  pub stack_name: StackName,
  pub template_location: ObjectLocation,
  pub capabilities: Vec<Capability>,
  pub on_failure: FailurePolicy,
  /// Keep resources created in earlier successful operations when a create fails.
  pub retain_except_on_create: bool,
}

/// Request to propose a change against an existing stack.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalRequest {
  pub stack_name: StackName,
  pub proposal_name: String,
  pub template_location: ObjectLocation,
  pub capabilities: Vec<Capability>,
  pub include_nested_stacks: bool,
  pub on_stack_failure: FailurePolicy,
}

/// What the service reports about an existing stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSummary {
  pub stack_name: String,
  pub status: String,
  pub created_at: u64,
  pub updated_at: Option<u64>,
}

/// Lifecycle of a change proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalState {
  Pending,
  Ready,
  Failed,
  Applied,
}

impl ProposalState {
  pub fn as_str(&self) -> &'static str {
    match self {
      ProposalState::Pending => "PENDING",
      ProposalState::Ready => "READY",
      ProposalState::Failed => "FAILED",
      ProposalState::Applied => "APPLIED",
    }
  }

  /// Every state but `Pending` is final for polling purposes.
  pub fn is_terminal(&self) -> bool {
    !matches!(self, ProposalState::Pending)
  }
}

impl fmt::Display for ProposalState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalStatus {
  pub state: ProposalState,
  /// Human-readable explanation, set when the proposal failed.
  pub reason: Option<String>,
}

impl ProposalStatus {
  pub fn new(state: ProposalState) -> Self {
    Self { state, reason: None }
  }

  pub fn failed(reason: impl Into<String>) -> Self {
    Self {
      state: ProposalState::Failed,
      reason: Some(reason.into()),
    }
  }
}

/// Errors returned by deployment service backends.
#[derive(Debug, Error)]
pub enum ServiceError {
  /// The stack has never been created. This is how absence is signalled.
  #[error("stack {0} does not exist")]
  StackNotFound(String),

  #[error("stack {0} already exists")]
  StackExists(String),

  #[error("change proposal {0} does not exist")]
  ProposalNotFound(String),

  #[error("change proposal {0} already exists")]
  ProposalExists(String),

  #[error("change proposal {name} is {state} and cannot be executed")]
  ProposalNotExecutable { name: String, state: ProposalState },

  #[error("template validation failed: {0}")]
  Validation(String),

  #[error("io error: {0}")]
  Io(#[from] io::Error),

  #[error("failed to read service state: {0}")]
  State(#[from] serde_json::Error),

  /// Transport, auth or other failure reported by a remote service.
  #[error("{0}")]
  Backend(String),
}

/// The managed infrastructure deployment API.
#[async_trait]
pub trait DeploymentService: Send + Sync {
  /// Look up a stack. Absence is reported as [`ServiceError::StackNotFound`].
  async fn describe(&self, stack: &StackName) -> Result<DeploymentSummary, ServiceError>;

  async fn create(&self, request: &CreateRequest) -> Result<(), ServiceError>;

  async fn create_proposal(&self, request: &ProposalRequest) -> Result<ProposalId, ServiceError>;

  async fn describe_proposal(&self, proposal: &ProposalId, stack: &StackName) -> Result<ProposalStatus, ServiceError>;

  async fn execute_proposal(&self, proposal: &ProposalId, stack: &StackName) -> Result<(), ServiceError>;
}
