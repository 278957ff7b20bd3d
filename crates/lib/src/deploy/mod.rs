//! Deployment orchestration.
//!
//! [`Deployer`] runs one attempt end to end: it opens a staging area, splits
//! and stages the template, reads the stack's current state and then either
//! creates the stack or proposes, awaits and executes a change to it.
//!
//! The deployment service is reached through [`DeploymentService`]; the crate
//! ships [`LocalDeploymentService`], which keeps its ledger on disk.

mod local;
mod orchestrator;
mod proposal;
mod service;
mod types;

pub use local::{LocalDeploymentService, NO_CHANGES_REASON, ProposalRecord, StackRecord};
pub use orchestrator::{Deployer, DeploymentState, validate_template};
pub use proposal::{PollConfig, ProposalOutcome, proposal_name, wait_for_proposal};
pub use service::{
  Capability, CreateRequest, DeploymentService, DeploymentSummary, FailurePolicy, ProposalId, ProposalRequest,
  ProposalState, ProposalStatus, ServiceError, StackName,
};
pub use types::{DeployAction, DeployError, DeployOutcome, InputError, Phase};
