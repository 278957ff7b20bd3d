//! Change proposal naming and status polling.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::service::{DeploymentService, ProposalId, ProposalState, StackName};
use super::types::DeployError;

/// Backoff settings for waiting on a change proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
  /// Delay after the first pending status.
  pub base_delay_ms: u64,
  /// Upper bound for a single delay.
  pub max_delay_ms: u64,
  /// Multiplier applied to the delay after each pending status.
  pub backoff_factor: f64,
  /// Total number of status checks before giving up.
  pub max_attempts: u32,
}

impl Default for PollConfig {
  fn default() -> Self {
    Self {
      base_delay_ms: 1_000,
      max_delay_ms: 15_000,
      backoff_factor: 2.0,
      max_attempts: 120,
    }
  }
}

impl PollConfig {
  /// Delay before status check `attempt + 1` (0-indexed).
  pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
    let delay = self.base_delay_ms as f64 * self.backoff_factor.powi(attempt as i32);
    let capped = delay.min(self.max_delay_ms as f64).max(0.0);
    Duration::from_millis(capped as u64)
  }
}

/// How a change proposal settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalOutcome {
  /// Evaluated and ready to execute.
  Ready,
  /// Rejected by the service with the given reason.
  Rejected(String),
  /// Already executed by someone else.
  AlreadyApplied,
}

/// Reason reported when the service fails a proposal without saying why.
const UNSPECIFIED_REASON: &str = "change proposal failed without a reason";

/// Unique change proposal name: `Update-<UTC timestamp>Z-<random suffix>`.
pub fn proposal_name(now: DateTime<Utc>) -> String {
  let suffix = Uuid::new_v4().simple().to_string();
  format!("Update-{}Z-{}", now.format("%Y-%m-%d-%H-%M-%S"), &suffix[..8])
}

/// Poll a proposal until it leaves `Pending`, backing off between checks.
///
/// Gives up with [`DeployError::ProposalTimeout`] after `max_attempts` checks.
pub async fn wait_for_proposal(
  service: &dyn DeploymentService,
  proposal: &ProposalId,
  stack: &StackName,
  poll: &PollConfig,
) -> Result<ProposalOutcome, DeployError> {
  let attempts = poll.max_attempts.max(1);

  for attempt in 0..attempts {
    let status = service
      .describe_proposal(proposal, stack)
      .await
      .map_err(DeployError::Deployment)?;

    match status.state {
      ProposalState::Ready => return Ok(ProposalOutcome::Ready),
      ProposalState::Applied => return Ok(ProposalOutcome::AlreadyApplied),
      ProposalState::Failed => {
        let reason = status.reason.unwrap_or_else(|| UNSPECIFIED_REASON.to_string());
        return Ok(ProposalOutcome::Rejected(reason));
      }
      ProposalState::Pending => {}
    }

    if attempt + 1 < attempts {
      let delay = poll.delay_for_attempt(attempt);
      debug!(
        proposal = %proposal,
        attempt = attempt + 1,
        delay_ms = delay.as_millis() as u64,
        "change proposal pending"
      );
      tokio::time::sleep(delay).await;
    }
  }

  Err(DeployError::ProposalTimeout {
    name: proposal.to_string(),
    attempts,
  })
}
