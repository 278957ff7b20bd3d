//! File-backed deployment service.
//!
//! Keeps a ledger of stacks and change proposals on disk instead of talking
//! to a remote service. Templates are read from their `file://` locations at
//! call time and reduced to a digest, so staged objects can be removed as soon
//! as the call returns.
//!
//! # Storage Layout
//!
//! ```text
//! {root}/
//! └── <stack>/
//!     ├── stack.json              # StackRecord
//!     └── proposals/
//!         └── <proposal>.json     # ProposalRecord
//! ```
//!
//! Ledger records are read and written with `tokio::fs`. Template resolution
//! parses and hashes whole template sets, so it runs on the blocking pool.
//!
//! A template's digest covers the root with each nested `TemplateURL`
//! replaced by the nested template's own digest. Staging the same templates
//! in a different container therefore yields the same digest, and a proposal
//! for an unchanged template set fails the way a real service reports "no
//! changes".

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use super::service::{
  Capability, CreateRequest, DeploymentService, DeploymentSummary, ProposalId, ProposalRequest, ProposalState,
  ProposalStatus, ServiceError, StackName,
};
use crate::store::ObjectLocation;
use crate::template::Template;
use crate::util::hash::{ContentHash, hash_bytes};

/// Reason given for a proposal that would change nothing.
pub const NO_CHANGES_REASON: &str = "No updates are to be performed.";

const STACKS_DIR: &str = "stacks";
const STACK_FILE: &str = "stack.json";
const PROPOSALS_DIR: &str = "proposals";

/// Stack references nested deeper than this are rejected.
const MAX_NESTING_DEPTH: usize = 8;

/// Persisted state of a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackRecord {
  pub stack_name: String,
  pub status: String,
  pub created_at: u64,
  pub updated_at: Option<u64>,
  pub template_digest: ContentHash,
  pub root_resources: usize,
  /// Resource count per nested stack reference.
  pub nested_templates: BTreeMap<String, usize>,
  pub capabilities: Vec<Capability>,
  pub last_proposal: Option<String>,
}

/// Persisted state of a change proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRecord {
  pub name: String,
  pub stack_name: String,
  pub state: ProposalState,
  pub reason: Option<String>,
  pub template_digest: Option<ContentHash>,
  pub root_resources: usize,
  pub nested_templates: BTreeMap<String, usize>,
  pub capabilities: Vec<Capability>,
  pub created_at: u64,
  pub executed_at: Option<u64>,
}

/// A template set read back from storage.
#[derive(Debug)]
struct ResolvedTemplate {
  digest: ContentHash,
  resources: usize,
  nested: BTreeMap<String, usize>,
}

/// Deployment service that records stacks under a local directory.
#[derive(Debug, Clone)]
pub struct LocalDeploymentService {
  root: PathBuf,
}

impl LocalDeploymentService {
  pub fn new(root: PathBuf) -> Self {
    Self { root }
  }

  /// Service rooted at `<state>/stacks`.
  pub fn in_state_dir(state: &Path) -> Self {
    Self::new(state.join(STACKS_DIR))
  }

  pub fn root(&self) -> &PathBuf {
    &self.root
  }

  fn stack_dir(&self, stack: &StackName) -> PathBuf {
    self.root.join(stack.as_str())
  }

  fn stack_path(&self, stack: &StackName) -> PathBuf {
    self.stack_dir(stack).join(STACK_FILE)
  }

  fn proposal_path(&self, stack: &StackName, name: &str) -> PathBuf {
    self.stack_dir(stack).join(PROPOSALS_DIR).join(format!("{}.json", name))
  }

  /// Load a stack's record.
  pub async fn stack_record(&self, stack: &StackName) -> Result<StackRecord, ServiceError> {
    match read_json(&self.stack_path(stack)).await {
      Err(ServiceError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
        Err(ServiceError::StackNotFound(stack.to_string()))
      }
      other => other,
    }
  }

  /// Load a change proposal's record.
  pub async fn proposal_record(&self, stack: &StackName, name: &str) -> Result<ProposalRecord, ServiceError> {
    validate_proposal_name(name)?;
    match read_json(&self.proposal_path(stack, name)).await {
      Err(ServiceError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
        Err(ServiceError::ProposalNotFound(name.to_string()))
      }
      other => other,
    }
  }

  /// Every proposal recorded for a stack, oldest first.
  pub async fn proposals(&self, stack: &StackName) -> Result<Vec<ProposalRecord>, ServiceError> {
    let dir = self.stack_dir(stack).join(PROPOSALS_DIR);
    let mut entries = match fs::read_dir(&dir).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(ServiceError::Io(e)),
    };

    let mut records = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if path.extension().is_some_and(|ext| ext == "json") {
        records.push(read_json::<ProposalRecord>(&path).await?);
      }
    }
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
    Ok(records)
  }
}

#[async_trait]
impl DeploymentService for LocalDeploymentService {
  async fn describe(&self, stack: &StackName) -> Result<DeploymentSummary, ServiceError> {
    let record = self.stack_record(stack).await?;
    Ok(DeploymentSummary {
      stack_name: record.stack_name,
      status: record.status,
      created_at: record.created_at,
      updated_at: record.updated_at,
    })
  }

  async fn create(&self, request: &CreateRequest) -> Result<(), ServiceError> {
    let path = self.stack_path(&request.stack_name);
    if fs::try_exists(&path).await? {
      return Err(ServiceError::StackExists(request.stack_name.to_string()));
    }

    let resolved = resolve_blocking(request.template_location.clone()).await?;
    let record = StackRecord {
      stack_name: request.stack_name.to_string(),
      status: "CREATE_COMPLETE".to_string(),
      created_at: now_unix(),
      updated_at: None,
      template_digest: resolved.digest,
      root_resources: resolved.resources,
      nested_templates: resolved.nested,
      capabilities: request.capabilities.clone(),
      last_proposal: None,
    };
    write_json(&path, &record).await?;

    info!(
      stack = %request.stack_name,
      digest = %record.template_digest.short(12),
      nested = record.nested_templates.len(),
      "stack created"
    );
    Ok(())
  }

  async fn create_proposal(&self, request: &ProposalRequest) -> Result<ProposalId, ServiceError> {
    validate_proposal_name(&request.proposal_name)?;
    let stack = self.stack_record(&request.stack_name).await?;

    let path = self.proposal_path(&request.stack_name, &request.proposal_name);
    if fs::try_exists(&path).await? {
      return Err(ServiceError::ProposalExists(request.proposal_name.clone()));
    }

    let mut record = ProposalRecord {
      name: request.proposal_name.clone(),
      stack_name: request.stack_name.to_string(),
      state: ProposalState::Ready,
      reason: None,
      template_digest: None,
      root_resources: 0,
      nested_templates: BTreeMap::new(),
      capabilities: request.capabilities.clone(),
      created_at: now_unix(),
      executed_at: None,
    };

    match resolve_blocking(request.template_location.clone()).await {
      Ok(resolved) => {
        if resolved.digest == stack.template_digest {
          record.state = ProposalState::Failed;
          record.reason = Some(NO_CHANGES_REASON.to_string());
        }
        record.template_digest = Some(resolved.digest);
        record.root_resources = resolved.resources;
        record.nested_templates = resolved.nested;
      }
      Err(ServiceError::Validation(reason)) => {
        record.state = ProposalState::Failed;
        record.reason = Some(reason);
      }
      Err(e) => return Err(e),
    }

    write_json(&path, &record).await?;

    info!(
      stack = %request.stack_name,
      proposal = %record.name,
      state = %record.state,
      "change proposal created"
    );
    Ok(ProposalId(record.name))
  }

  async fn describe_proposal(&self, proposal: &ProposalId, stack: &StackName) -> Result<ProposalStatus, ServiceError> {
    let record = self.proposal_record(stack, &proposal.0).await?;
    Ok(ProposalStatus {
      state: record.state,
      reason: record.reason,
    })
  }

  async fn execute_proposal(&self, proposal: &ProposalId, stack: &StackName) -> Result<(), ServiceError> {
    let mut record = self.proposal_record(stack, &proposal.0).await?;
    if record.state != ProposalState::Ready {
      return Err(ServiceError::ProposalNotExecutable {
        name: record.name,
        state: record.state,
      });
    }

    let digest = record
      .template_digest
      .clone()
      .ok_or_else(|| ServiceError::Validation(format!("change proposal {} has no template", record.name)))?;

    let mut stack_record = self.stack_record(stack).await?;
    let now = now_unix();

    stack_record.status = "UPDATE_COMPLETE".to_string();
    stack_record.updated_at = Some(now);
    stack_record.template_digest = digest;
    stack_record.root_resources = record.root_resources;
    stack_record.nested_templates = record.nested_templates.clone();
    stack_record.capabilities = record.capabilities.clone();
    stack_record.last_proposal = Some(record.name.clone());

    record.state = ProposalState::Applied;
    record.executed_at = Some(now);

    write_json(&self.proposal_path(stack, &record.name), &record).await?;
    write_json(&self.stack_path(stack), &stack_record).await?;

    info!(stack = %stack, proposal = %record.name, "change proposal executed");
    Ok(())
  }
}

async fn resolve_blocking(location: ObjectLocation) -> Result<ResolvedTemplate, ServiceError> {
  tokio::task::spawn_blocking(move || resolve(&location, 0))
    .await
    .map_err(|e| ServiceError::Backend(format!("template resolution failed: {}", e)))?
}

/// Read a template set from storage and compute its digest.
fn resolve(location: &ObjectLocation, depth: usize) -> Result<ResolvedTemplate, ServiceError> {
  if depth > MAX_NESTING_DEPTH {
    return Err(ServiceError::Validation(format!(
      "stack nesting deeper than {} levels at {}",
      MAX_NESTING_DEPTH, location
    )));
  }

  let path = location
    .to_file_path()
    .ok_or_else(|| ServiceError::Validation(format!("unsupported template location {}", location)))?;
  let content = std::fs::read_to_string(&path)
    .map_err(|e| ServiceError::Validation(format!("template {} could not be read: {}", location, e)))?;
  let mut template = Template::from_yaml(&content)
    .map_err(|e| ServiceError::Validation(format!("template {} is invalid: {}", location, e)))?;

  if template.is_empty() {
    return Err(ServiceError::Validation(format!(
      "template {} declares no resources",
      location
    )));
  }

  let mut nested = BTreeMap::new();
  for (name, resource) in template.resources.iter_mut() {
    if !resource.is_stack_reference() {
      continue;
    }
    let url = resource
      .template_url()
      .ok_or_else(|| ServiceError::Validation(format!("stack reference {} has no TemplateURL", name)))?
      .to_string();

    let child = resolve(&ObjectLocation(url), depth + 1)?;
    debug!(reference = %name, digest = %child.digest.short(12), "resolved nested template");
    resource.set_template_url(&child.digest.0);
    nested.insert(name.clone(), child.resources);
  }

  let canonical = template
    .to_yaml()
    .map_err(|e| ServiceError::Validation(format!("template {} could not be rendered: {}", location, e)))?;

  Ok(ResolvedTemplate {
    digest: hash_bytes(canonical.as_bytes()),
    resources: template.len(),
    nested,
  })
}

fn validate_proposal_name(name: &str) -> Result<(), ServiceError> {
  let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
  if valid {
    Ok(())
  } else {
    Err(ServiceError::Validation(format!("invalid change proposal name {:?}", name)))
  }
}

async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ServiceError> {
  let content = fs::read_to_string(path).await?;
  Ok(serde_json::from_str(&content)?)
}

/// Write via a temp file and rename so a reader never sees a partial record.
async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ServiceError> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).await?;
  }
  let content = serde_json::to_string_pretty(value)?;
  let temp_path = path.with_extension("json.tmp");
  fs::write(&temp_path, &content).await?;
  fs::rename(&temp_path, path).await?;
  Ok(())
}

fn now_unix() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}
