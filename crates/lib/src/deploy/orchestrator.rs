//! Deployment attempt orchestration.
//!
//! One attempt walks `container_created → staged → deployment_queried →
//! {create_path | update_path} → done`. Whatever happens after the staging
//! container exists (success, error, timeout, cancellation), the staging area
//! is released before the attempt returns.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, warn};

use super::proposal::{ProposalOutcome, proposal_name, wait_for_proposal};
use super::service::{
  CreateRequest, DeploymentService, DeploymentSummary, FailurePolicy, ProposalRequest, ServiceError, StackName,
};
use super::types::{DeployAction, DeployError, DeployOutcome, InputError, Phase};
use crate::config::DeployConfig;
use crate::split::{Classifier, split};
use crate::staging::{StagedTemplates, StagingArea};
use crate::store::{ArtifactStore, ContainerId};
use crate::template::Template;

/// Current lifecycle state of a stack, read fresh on every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentState {
  Absent,
  Present(DeploymentSummary),
}

/// Reject input that must never reach the artifact store.
pub fn validate_template(template: &Template) -> Result<(), InputError> {
  if template.is_empty() {
    return Err(InputError::EmptyTemplate);
  }
  Ok(())
}

/// Drives deployment attempts against one artifact store and one service.
pub struct Deployer {
  store: Arc<dyn ArtifactStore>,
  service: Arc<dyn DeploymentService>,
  classifier: Arc<dyn Classifier>,
  config: DeployConfig,
}

impl Deployer {
  pub fn new(store: Arc<dyn ArtifactStore>, service: Arc<dyn DeploymentService>, config: DeployConfig) -> Self {
    let classifier = config.split.classifier();
    Self {
      store,
      service,
      classifier,
      config,
    }
  }

  /// Run one attempt, bounded by the configured attempt timeout.
  pub async fn deploy(&self, template: Template, stack: &StackName) -> Result<DeployOutcome, DeployError> {
    self.deploy_until(template, stack, std::future::pending::<()>()).await
  }

  /// Run one attempt that is abandoned when `cancel` resolves.
  ///
  /// Staged artifacts are released on every exit after the container exists.
  pub async fn deploy_until<F>(
    &self,
    template: Template,
    stack: &StackName,
    cancel: F,
  ) -> Result<DeployOutcome, DeployError>
  where
    F: Future<Output = ()>,
  {
    validate_template(&template)?;

    let started = Instant::now();
    let container = ContainerId::generate(&self.config.container_prefix);
    let mut area = StagingArea::open(Arc::clone(&self.store), container.clone())
      .await?
      .with_max_concurrent_uploads(self.config.max_concurrent_uploads);

    info!(stack = %stack, container = %container, "deployment attempt started");

    let timeout = self.config.attempt_timeout();
    let mut phase = Phase::ContainerCreated;

    let result = tokio::select! {
      result = self.run(template, stack, &mut area, &mut phase) => result,
      _ = tokio::time::sleep(timeout) => Err(DeployError::TimedOut(timeout)),
      _ = cancel => Err(DeployError::Cancelled),
    };

    if let Err(e) = &result {
      error!(stack = %stack, phase = %phase, error = %e, "deployment attempt failed");
    }

    let release = area.release_all().await;
    if !release.is_clean() {
      warn!(
        container = %container,
        failed = release.failed.len(),
        "staging artifacts were not fully released"
      );
    }

    let (action, staged) = result?;

    let outcome = DeployOutcome {
      stack_name: stack.clone(),
      action,
      container,
      root_location: staged.root_location,
      nested_templates: staged.nested.len(),
      release,
      elapsed: started.elapsed(),
    };

    info!(
      stack = %stack,
      action = ?outcome.action,
      elapsed = ?outcome.elapsed,
      "deployment attempt finished"
    );
    Ok(outcome)
  }

  async fn run(
    &self,
    template: Template,
    stack: &StackName,
    area: &mut StagingArea,
    phase: &mut Phase,
  ) -> Result<(DeployAction, StagedTemplates), DeployError> {
    let split = split(template, self.classifier.as_ref())?;
    let staged = area.stage(split).await?;
    *phase = Phase::Staged;

    let state = self.query_state(stack).await?;
    *phase = Phase::DeploymentQueried;

    let action = match state {
      DeploymentState::Absent => {
        *phase = Phase::CreatePath;
        self.create(stack, &staged).await?
      }
      DeploymentState::Present(summary) => {
        *phase = Phase::UpdatePath;
        info!(stack = %stack, status = %summary.status, "stack exists, proposing change");
        self.update(stack, &staged).await?
      }
    };

    *phase = Phase::Done;
    Ok((action, staged))
  }

  /// Look the stack up. Only "not found" means absent; anything else is fatal.
  pub async fn query_state(&self, stack: &StackName) -> Result<DeploymentState, DeployError> {
    match self.service.describe(stack).await {
      Ok(summary) => Ok(DeploymentState::Present(summary)),
      Err(ServiceError::StackNotFound(_)) => Ok(DeploymentState::Absent),
      Err(e) => Err(DeployError::Query(e)),
    }
  }

  async fn create(&self, stack: &StackName, staged: &StagedTemplates) -> Result<DeployAction, DeployError> {
    let request = CreateRequest {
      stack_name: stack.clone(),
      template_location: staged.root_location.clone(),
      capabilities: self.config.capabilities.clone(),
      on_failure: FailurePolicy::Rollback,
      retain_except_on_create: true,
    };

    info!(stack = %stack, template = %request.template_location, "creating stack");
    self.service.create(&request).await.map_err(DeployError::Deployment)?;

    Ok(DeployAction::Created)
  }

  async fn update(&self, stack: &StackName, staged: &StagedTemplates) -> Result<DeployAction, DeployError> {
    let request = ProposalRequest {
      stack_name: stack.clone(),
      proposal_name: proposal_name(Utc::now()),
      template_location: staged.root_location.clone(),
      capabilities: self.config.capabilities.clone(),
      include_nested_stacks: true,
      on_stack_failure: FailurePolicy::Rollback,
    };

    let proposal = self
      .service
      .create_proposal(&request)
      .await
      .map_err(DeployError::Deployment)?;
    info!(stack = %stack, proposal = %proposal, "change proposal created");

    match wait_for_proposal(self.service.as_ref(), &proposal, stack, &self.config.poll).await? {
      ProposalOutcome::Ready => {
        self
          .service
          .execute_proposal(&proposal, stack)
          .await
          .map_err(DeployError::Deployment)?;
        info!(stack = %stack, proposal = %proposal, "change proposal executed");
      }
      ProposalOutcome::Rejected(reason) => {
        return Err(DeployError::ProposalRejected { reason });
      }
      ProposalOutcome::AlreadyApplied => {
        warn!(stack = %stack, proposal = %proposal, "change proposal was already applied");
      }
    }

    Ok(DeployAction::Updated {
      proposal: request.proposal_name,
    })
  }
}
