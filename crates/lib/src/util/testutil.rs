//! Test doubles for the artifact store and the deployment service.
//!
//! Both record every call they receive and can be told to fail specific calls.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::deploy::{
  CreateRequest, DeploymentService, DeploymentSummary, ProposalId, ProposalRequest, ProposalState, ProposalStatus,
  ServiceError, StackName,
};
use crate::store::{ArtifactStore, ContainerId, MemoryArtifactStore, ObjectLocation, StoreError};

/// A call received by [`RecordingStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
  CreateContainer(ContainerId),
  DeleteContainer(ContainerId),
  Put(String),
  Delete(String),
}

/// Memory-backed store that records calls and injects failures.
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
  inner: MemoryArtifactStore,
  calls: Arc<Mutex<Vec<StoreCall>>>,
  failing_create: bool,
  failing_puts: Vec<String>,
  failing_deletes: Vec<String>,
}

impl RecordingStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn failing_create(mut self) -> Self {
    self.failing_create = true;
    self
  }

  pub fn failing_put(mut self, key: &str) -> Self {
    self.failing_puts.push(key.to_string());
    self
  }

  pub fn failing_delete(mut self, key: &str) -> Self {
    self.failing_deletes.push(key.to_string());
    self
  }

  pub fn inner(&self) -> &MemoryArtifactStore {
    &self.inner
  }

  pub fn calls(&self) -> Vec<StoreCall> {
    self.calls.lock().unwrap().clone()
  }

  pub fn count(&self, predicate: impl Fn(&StoreCall) -> bool) -> usize {
    self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
  }

  /// Keys of every attempted put, in call order.
  pub fn puts(&self) -> Vec<String> {
    self
      .calls()
      .into_iter()
      .filter_map(|c| match c {
        StoreCall::Put(key) => Some(key),
        _ => None,
      })
      .collect()
  }

  /// Keys of every attempted delete, in call order.
  pub fn deletes(&self) -> Vec<String> {
    self
      .calls()
      .into_iter()
      .filter_map(|c| match c {
        StoreCall::Delete(key) => Some(key),
        _ => None,
      })
      .collect()
  }

  fn record(&self, call: StoreCall) {
    self.calls.lock().unwrap().push(call);
  }
}

#[async_trait]
impl ArtifactStore for RecordingStore {
  async fn create_container(&self, container: &ContainerId) -> Result<(), StoreError> {
    self.record(StoreCall::CreateContainer(container.clone()));
    if self.failing_create {
      return Err(StoreError::Backend("injected create failure".to_string()));
    }
    self.inner.create_container(container).await
  }

  async fn delete_container(&self, container: &ContainerId) -> Result<(), StoreError> {
    self.record(StoreCall::DeleteContainer(container.clone()));
    self.inner.delete_container(container).await
  }

  async fn put(&self, container: &ContainerId, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError> {
    self.record(StoreCall::Put(key.to_string()));
    if self.failing_puts.iter().any(|k| k == key) {
      return Err(StoreError::Backend(format!("injected put failure for {}", key)));
    }
    self.inner.put(container, key, body, content_type).await
  }

  async fn delete(&self, container: &ContainerId, key: &str) -> Result<(), StoreError> {
    self.record(StoreCall::Delete(key.to_string()));
    if self.failing_deletes.iter().any(|k| k == key) {
      return Err(StoreError::Backend(format!("injected delete failure for {}", key)));
    }
    self.inner.delete(container, key).await
  }

  fn location(&self, container: &ContainerId, key: &str) -> ObjectLocation {
    self.inner.location(container, key)
  }
}

/// Store wrapper that holds every put for `put_delay` before delegating.
///
/// Keys are recorded when the put starts, so an upload still sleeping when
/// its attempt is abandoned is visible in [`SlowStore::puts`].
#[derive(Clone)]
pub struct SlowStore {
  inner: Arc<dyn ArtifactStore>,
  put_delay: Duration,
  puts: Arc<Mutex<Vec<String>>>,
  deletes: Arc<Mutex<Vec<String>>>,
}

impl SlowStore {
  pub fn new(inner: Arc<dyn ArtifactStore>, put_delay: Duration) -> Self {
    Self {
      inner,
      put_delay,
      puts: Arc::default(),
      deletes: Arc::default(),
    }
  }

  pub fn puts(&self) -> Vec<String> {
    self.puts.lock().unwrap().clone()
  }

  pub fn deletes(&self) -> Vec<String> {
    self.deletes.lock().unwrap().clone()
  }
}

#[async_trait]
impl ArtifactStore for SlowStore {
  async fn create_container(&self, container: &ContainerId) -> Result<(), StoreError> {
    self.inner.create_container(container).await
  }

  async fn delete_container(&self, container: &ContainerId) -> Result<(), StoreError> {
    self.inner.delete_container(container).await
  }

  async fn put(&self, container: &ContainerId, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError> {
    self.puts.lock().unwrap().push(key.to_string());
    tokio::time::sleep(self.put_delay).await;
    self.inner.put(container, key, body, content_type).await
  }

  async fn delete(&self, container: &ContainerId, key: &str) -> Result<(), StoreError> {
    self.deletes.lock().unwrap().push(key.to_string());
    self.inner.delete(container, key).await
  }

  fn location(&self, container: &ContainerId, key: &str) -> ObjectLocation {
    self.inner.location(container, key)
  }
}

/// A call received by [`ScriptedService`].
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
  Describe(String),
  Create(CreateRequest),
  CreateProposal(ProposalRequest),
  DescribeProposal(String),
  ExecuteProposal(String),
}

#[derive(Debug, Clone)]
enum StackScript {
  Absent,
  Present,
  Failing(String),
}

/// Deployment service whose answers are fixed up front.
///
/// Proposal statuses are handed out in order; the last one repeats.
#[derive(Debug, Clone)]
pub struct ScriptedService {
  stack: StackScript,
  proposal_states: Arc<Mutex<VecDeque<ProposalStatus>>>,
  create_delay: Option<Duration>,
  failing_create: Option<String>,
  failing_create_proposal: Option<String>,
  failing_describe_proposal: Option<String>,
  failing_execute: Option<String>,
  calls: Arc<Mutex<Vec<ServiceCall>>>,
}

impl ScriptedService {
  fn with_stack(stack: StackScript) -> Self {
    Self {
      stack,
      proposal_states: Arc::new(Mutex::new(VecDeque::from([ProposalStatus::new(ProposalState::Ready)]))),
      create_delay: None,
      failing_create: None,
      failing_create_proposal: None,
      failing_describe_proposal: None,
      failing_execute: None,
      calls: Arc::new(Mutex::new(Vec::new())),
    }
  }

  /// The stack does not exist.
  pub fn absent() -> Self {
    Self::with_stack(StackScript::Absent)
  }

  /// The stack exists.
  pub fn present() -> Self {
    Self::with_stack(StackScript::Present)
  }

  /// Describing the stack fails with something other than "not found".
  pub fn failing_describe(message: &str) -> Self {
    Self::with_stack(StackScript::Failing(message.to_string()))
  }

  pub fn with_proposal_states(self, states: Vec<ProposalStatus>) -> Self {
    *self.proposal_states.lock().unwrap() = states.into();
    self
  }

  /// Make `create` take this long before succeeding.
  pub fn with_create_delay(mut self, delay: Duration) -> Self {
    self.create_delay = Some(delay);
    self
  }

  pub fn failing_create(mut self, message: &str) -> Self {
    self.failing_create = Some(message.to_string());
    self
  }

  pub fn failing_create_proposal(mut self, message: &str) -> Self {
    self.failing_create_proposal = Some(message.to_string());
    self
  }

  pub fn failing_describe_proposal(mut self, message: &str) -> Self {
    self.failing_describe_proposal = Some(message.to_string());
    self
  }

  pub fn failing_execute(mut self, message: &str) -> Self {
    self.failing_execute = Some(message.to_string());
    self
  }

  pub fn calls(&self) -> Vec<ServiceCall> {
    self.calls.lock().unwrap().clone()
  }

  pub fn count(&self, predicate: impl Fn(&ServiceCall) -> bool) -> usize {
    self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
  }

  fn record(&self, call: ServiceCall) {
    self.calls.lock().unwrap().push(call);
  }
}

#[async_trait]
impl DeploymentService for ScriptedService {
  async fn describe(&self, stack: &StackName) -> Result<DeploymentSummary, ServiceError> {
    self.record(ServiceCall::Describe(stack.to_string()));
    match &self.stack {
      StackScript::Absent => Err(ServiceError::StackNotFound(stack.to_string())),
      StackScript::Failing(message) => Err(ServiceError::Backend(message.clone())),
      StackScript::Present => Ok(DeploymentSummary {
        stack_name: stack.to_string(),
        status: "CREATE_COMPLETE".to_string(),
        created_at: 0,
        updated_at: None,
      }),
    }
  }

  async fn create(&self, request: &CreateRequest) -> Result<(), ServiceError> {
    self.record(ServiceCall::Create(request.clone()));
    if let Some(delay) = self.create_delay {
      tokio::time::sleep(delay).await;
    }
    match &self.failing_create {
      Some(message) => Err(ServiceError::Backend(message.clone())),
      None => Ok(()),
    }
  }

  async fn create_proposal(&self, request: &ProposalRequest) -> Result<ProposalId, ServiceError> {
    self.record(ServiceCall::CreateProposal(request.clone()));
    match &self.failing_create_proposal {
      Some(message) => Err(ServiceError::Backend(message.clone())),
      None => Ok(ProposalId(format!("arn:proposal/{}", request.proposal_name))),
    }
  }

  async fn describe_proposal(&self, proposal: &ProposalId, _stack: &StackName) -> Result<ProposalStatus, ServiceError> {
    self.record(ServiceCall::DescribeProposal(proposal.to_string()));
    if let Some(message) = &self.failing_describe_proposal {
      return Err(ServiceError::Backend(message.clone()));
    }

    let mut states = self.proposal_states.lock().unwrap();
    let status = if states.len() > 1 {
      states.pop_front()
    } else {
      states.front().cloned()
    };
    Ok(status.unwrap_or_else(|| ProposalStatus::new(ProposalState::Ready)))
  }

  async fn execute_proposal(&self, proposal: &ProposalId, _stack: &StackName) -> Result<(), ServiceError> {
    self.record(ServiceCall::ExecuteProposal(proposal.to_string()));
    match &self.failing_execute {
      Some(message) => Err(ServiceError::Backend(message.clone())),
      None => Ok(()),
    }
  }
}
