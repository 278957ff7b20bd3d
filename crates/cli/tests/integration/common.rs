//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding the state directory,
/// the config directory and any files a test writes.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Write a file relative to the temp directory and return its path.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// State directory for staged artifacts and the stack ledger.
  pub fn state_path(&self) -> PathBuf {
    let p = self.temp.path().join("state");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Config directory, empty unless a test writes to it.
  pub fn config_path(&self) -> PathBuf {
    let p = self.temp.path().join("config");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn artifacts_path(&self) -> PathBuf {
    self.state_path().join("artifacts")
  }

  pub fn stack_file(&self, stack: &str) -> PathBuf {
    self.state_path().join("stacks").join(stack).join("stack.json")
  }

  /// Staging containers left behind in the local artifact store.
  pub fn leftover_containers(&self) -> Vec<PathBuf> {
    match std::fs::read_dir(self.artifacts_path()) {
      Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
      Err(_) => Vec::new(),
    }
  }

  /// Get a pre-configured Command for the nestack binary.
  ///
  /// Sets environment variables for isolated testing:
  /// - `NESTACK_HOME`: Isolated state directory
  /// - `XDG_CONFIG_HOME`: Isolated config directory
  /// - `APPDATA`: Isolated config directory (for Windows)
  pub fn nestack_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("nestack");
    cmd.env("NESTACK_HOME", self.state_path());
    cmd.env("XDG_CONFIG_HOME", self.config_path());
    cmd.env("APPDATA", self.config_path());
    cmd.env_remove("NESTACK_STACK_NAME");
    cmd.env_remove("RUST_LOG");
    cmd
  }

  /// Deploy a fixture to `stack`.
  pub fn deploy(&self, fixture: &str, stack: &str) -> Command {
    let mut cmd = self.nestack_cmd();
    cmd.arg("deploy").arg(fixture_path(fixture)).args(["--stack-name", stack]);
    cmd
  }
}
