//! Implementation of the `nestack status` command.
//!
//! Displays the local ledger's record for a stack.

use std::path::PathBuf;

use anyhow::{Context, Result};

use nestack_lib::deploy::{LocalDeploymentService, ServiceError};
use nestack_lib::platform::paths::state_dir;

use super::stack_name;
use crate::output::{self, OutputFormat, format_timestamp, print_json, print_stat, print_success, short_digest};

pub fn cmd_status(stack: Option<String>, state: Option<PathBuf>, output: OutputFormat, verbose: bool) -> Result<()> {
  let stack = stack_name(stack)?;
  let state = state.unwrap_or_else(state_dir);
  let service = LocalDeploymentService::in_state_dir(&state);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let (record, proposals) = rt.block_on(async {
    let record = service.stack_record(&stack).await?;
    let proposals = service.proposals(&stack).await?;
    Ok::<_, ServiceError>((record, proposals))
  })?;

  if output.is_json() {
    print_json(&serde_json::json!({
      "stack": record,
      "proposals": proposals,
    }))?;
    return Ok(());
  }

  print_success(&format!("Stack {}: {}", record.stack_name, record.status));
  print_stat("Created", &format_timestamp(record.created_at));
  if let Some(updated_at) = record.updated_at {
    print_stat("Updated", &format_timestamp(updated_at));
  }
  print_stat("Template", short_digest(&record.template_digest));
  print_stat("Root resources", &record.root_resources.to_string());
  print_stat("Nested templates", &record.nested_templates.len().to_string());
  for (reference, resources) in &record.nested_templates {
    println!("    {} {} ({} resources)", output::symbols::INFO, reference, resources);
  }
  if let Some(proposal) = &record.last_proposal {
    print_stat("Last proposal", proposal);
  }

  if verbose && !proposals.is_empty() {
    println!();
    println!("Proposals:");
    for proposal in &proposals {
      match &proposal.reason {
        Some(reason) => println!("  {} {} {}: {}", output::symbols::INFO, proposal.name, proposal.state, reason),
        None => println!("  {} {} {}", output::symbols::INFO, proposal.name, proposal.state),
      }
    }
  }

  Ok(())
}
