//! Implementation of the `nestack deploy` command.
//!
//! Splits the template, stages it in the local artifact store and creates or
//! updates the stack in the local ledger.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use nestack_lib::config::DeployConfig;
use nestack_lib::deploy::{DeployAction, Deployer, LocalDeploymentService};
use nestack_lib::platform::paths::state_dir;
use nestack_lib::store::LocalArtifactStore;

use super::{read_template, stack_name};
use crate::output::{OutputFormat, format_elapsed, print_json, print_stat, print_success, print_warning};

pub fn cmd_deploy(
  template: &str,
  stack: Option<String>,
  state: Option<PathBuf>,
  config: DeployConfig,
  output: OutputFormat,
) -> Result<()> {
  let stack = stack_name(stack)?;
  let template = read_template(template)?;
  let state = state.unwrap_or_else(state_dir);

  debug!(
    stack = %stack,
    state = %state.display(),
    timeout = ?config.attempt_timeout(),
    strategy = ?config.split.strategy,
    max_concurrent_uploads = config.max_concurrent_uploads,
    "resolved deploy settings"
  );

  let deployer = Deployer::new(
    Arc::new(LocalArtifactStore::in_state_dir(&state)),
    Arc::new(LocalDeploymentService::in_state_dir(&state)),
    config,
  );

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt.block_on(async {
    let interrupted = async {
      if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
      }
    };
    deployer.deploy_until(template, &stack, interrupted).await
  })?;

  if output.is_json() {
    let (action, proposal) = match &outcome.action {
      DeployAction::Created => ("created", None),
      DeployAction::Updated { proposal } => ("updated", Some(proposal.as_str())),
    };
    print_json(&serde_json::json!({
      "stack_name": outcome.stack_name.as_str(),
      "action": action,
      "proposal": proposal,
      "container": outcome.container.as_str(),
      "root_location": outcome.root_location.as_str(),
      "nested_templates": outcome.nested_templates,
      "artifacts_released": outcome.release.deleted.len(),
      "release_clean": outcome.release.is_clean(),
      "elapsed_ms": outcome.elapsed.as_millis() as u64,
    }))?;
  } else {
    match &outcome.action {
      DeployAction::Created => print_success(&format!("Created stack {}", outcome.stack_name)),
      DeployAction::Updated { proposal } => print_success(&format!(
        "Updated stack {} via change proposal {}",
        outcome.stack_name, proposal
      )),
    }
    print_stat("Nested templates", &outcome.nested_templates.to_string());
    print_stat("Artifacts released", &outcome.release.deleted.len().to_string());
    print_stat("Elapsed", &format_elapsed(outcome.elapsed));
  }

  if !outcome.release.is_clean() {
    print_warning(&format!(
      "staging container {} was not fully released",
      outcome.container
    ));
  }

  Ok(())
}
