//! Deployment configuration.
//!
//! Read from TOML. Every field has a default, so an empty or missing file
//! yields a working configuration.
//!
//! ```toml
//! container_prefix = "nestack.staging"
//! capabilities = ["CAPABILITY_IAM"]
//! attempt_timeout_secs = 1800
//! max_concurrent_uploads = 4
//!
//! [split]
//! strategy = "hot-types"
//! extra_types = ["AWS::Logs::LogGroup"]
//!
//! [poll]
//! base_delay_ms = 1000
//! max_delay_ms = 15000
//! backoff_factor = 2.0
//! max_attempts = 120
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::DEFAULT_CONTAINER_PREFIX;
use crate::deploy::{Capability, PollConfig};
use crate::platform::paths::config_file;
use crate::split::{Classifier, HotTypeClassifier, PerTypeClassifier};
use crate::staging::DEFAULT_MAX_CONCURRENT_UPLOADS;

/// Default attempt-wide timeout: 30 minutes.
const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 1800;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

/// How resources are assigned to nested templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SplitStrategy {
  /// Only designated hot types move, one nested template per type.
  #[default]
  HotTypes,
  /// Every type moves to its own nested template.
  PerType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
  pub strategy: SplitStrategy,

  /// Hot types in addition to the built-in set. Ignored by `per-type`.
  pub extra_types: Vec<String>,
}

impl SplitConfig {
  pub fn classifier(&self) -> Arc<dyn Classifier> {
    match self.strategy {
      SplitStrategy::HotTypes => Arc::new(HotTypeClassifier::default().extend(self.extra_types.iter().cloned())),
      SplitStrategy::PerType => Arc::new(PerTypeClassifier),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
  /// Staging containers are named `<container_prefix>.<random id>`.
  pub container_prefix: String,

  /// Acknowledged on every create and change proposal.
  pub capabilities: Vec<Capability>,

  pub split: SplitConfig,

  pub poll: PollConfig,

  /// Upper bound on a whole attempt, staging and deployment included.
  pub attempt_timeout_secs: u64,

  pub max_concurrent_uploads: usize,

  /// Exact attempt timeout set at runtime, e.g. from `--timeout 500ms`.
  #[serde(skip)]
  pub attempt_timeout_override: Option<Duration>,
}

impl Default for DeployConfig {
  fn default() -> Self {
    Self {
      container_prefix: DEFAULT_CONTAINER_PREFIX.to_string(),
      capabilities: vec![Capability::Iam],
      split: SplitConfig::default(),
      poll: PollConfig::default(),
      attempt_timeout_secs: DEFAULT_ATTEMPT_TIMEOUT_SECS,
      max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
      attempt_timeout_override: None,
    }
  }
}

impl DeployConfig {
  pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Load a config file that must exist.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    debug!(path = %path.display(), "loaded config");
    Self::from_toml(&content, path)
  }

  /// Load `explicit` if given, otherwise the default config file when present.
  pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
    if let Some(path) = explicit {
      return Self::load(path);
    }

    let path = config_file();
    if path.exists() {
      Self::load(&path)
    } else {
      debug!(path = %path.display(), "no config file, using defaults");
      Ok(Self::default())
    }
  }

  pub fn attempt_timeout(&self) -> Duration {
    self
      .attempt_timeout_override
      .unwrap_or_else(|| Duration::from_secs(self.attempt_timeout_secs))
  }

  /// Override the configured timeout without rounding to whole seconds.
  pub fn set_attempt_timeout(&mut self, timeout: Duration) {
    self.attempt_timeout_secs = timeout.as_secs();
    self.attempt_timeout_override = Some(timeout);
  }
}
