//! Deploy command integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, fixture_content, fixture_path};

#[test]
fn deploy_creates_new_stack() {
  let env = TestEnv::new();

  env
    .deploy("hot_and_ordinary.yaml", "web")
    .assert()
    .success()
    .stdout(predicate::str::contains("Created stack web"))
    .stdout(predicate::str::contains("Nested templates: 1"))
    .stdout(predicate::str::contains("Artifacts released: 2"));

  assert!(env.stack_file("web").exists());
}

#[test]
fn deploy_releases_staging_container() {
  let env = TestEnv::new();

  env.deploy("hot_and_ordinary.yaml", "web").assert().success();

  assert!(
    env.leftover_containers().is_empty(),
    "leftover containers: {:?}",
    env.leftover_containers()
  );
}

#[test]
fn deploy_records_split_layout() {
  let env = TestEnv::new();

  env.deploy("hot_and_ordinary.yaml", "web").assert().success();

  let record: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(env.stack_file("web")).unwrap()).unwrap();
  assert_eq!(record["status"], "CREATE_COMPLETE");
  // Four ordinary resources plus one stack reference.
  assert_eq!(record["root_resources"], 5);
  assert_eq!(record["nested_templates"]["AWSECSServiceNestedStack"], 1);
}

#[test]
fn redeploying_unchanged_template_is_rejected() {
  let env = TestEnv::new();

  env.deploy("hot_and_ordinary.yaml", "web").assert().success();

  env
    .deploy("hot_and_ordinary.yaml", "web")
    .assert()
    .failure()
    .stderr(predicate::str::contains("No updates are to be performed."));

  assert!(env.leftover_containers().is_empty());
}

#[test]
fn changed_template_updates_via_proposal() {
  let env = TestEnv::new();

  env.deploy("hot_and_ordinary.yaml", "web").assert().success();

  env
    .deploy("hot_and_ordinary_v2.yaml", "web")
    .assert()
    .success()
    .stdout(predicate::str::contains("Updated stack web via change proposal Update-"));

  let record: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(env.stack_file("web")).unwrap()).unwrap();
  assert_eq!(record["status"], "UPDATE_COMPLETE");
  assert!(env.leftover_containers().is_empty());
}

#[test]
fn deploy_reads_template_from_stdin() {
  let env = TestEnv::new();

  env
    .nestack_cmd()
    .args(["deploy", "-", "--stack-name", "piped"])
    .write_stdin(fixture_content("ordinary_only.yaml"))
    .assert()
    .success()
    .stdout(predicate::str::contains("Created stack piped"))
    .stdout(predicate::str::contains("Nested templates: 0"));
}

#[test]
fn deploy_empty_template_touches_nothing() {
  let env = TestEnv::new();

  env
    .deploy("empty.yaml", "web")
    .assert()
    .failure()
    .stderr(predicate::str::contains("template declares no resources"));

  assert!(!env.artifacts_path().exists());
  assert!(!env.stack_file("web").exists());
}

#[test]
fn deploy_rejects_non_mapping_template() {
  let env = TestEnv::new();

  env
    .deploy("not_a_template.yaml", "web")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to read template"));
}

#[test]
fn deploy_per_type_splits_every_type() {
  let env = TestEnv::new();

  env
    .deploy("hot_and_ordinary.yaml", "web")
    .arg("--per-type")
    .assert()
    .success()
    .stdout(predicate::str::contains("Nested templates: 5"))
    .stdout(predicate::str::contains("Artifacts released: 6"));

  assert!(env.leftover_containers().is_empty());
}

#[test]
fn deploy_json_output() {
  let env = TestEnv::new();

  let output = env
    .deploy("hot_and_ordinary.yaml", "web")
    .args(["--output", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["stack_name"], "web");
  assert_eq!(json["action"], "created");
  assert_eq!(json["proposal"], serde_json::Value::Null);
  assert_eq!(json["nested_templates"], 1);
  assert_eq!(json["artifacts_released"], 2);
  assert_eq!(json["release_clean"], true);
  assert!(json["container"].as_str().unwrap().starts_with("nestack.staging."));
}

#[test]
fn deploy_honors_state_dir_flag() {
  let env = TestEnv::new();
  let state = env.temp.path().join("elsewhere");

  env
    .deploy("ordinary_only.yaml", "web")
    .arg("--state-dir")
    .arg(&state)
    .assert()
    .success();

  assert!(state.join("stacks").join("web").join("stack.json").exists());
  assert!(!env.stack_file("web").exists());
}

#[test]
fn deploy_uses_config_file_split_types() {
  let env = TestEnv::new();
  let config = env.write_file("custom.toml", "[split]\nextra_types = [\"AWS::SQS::Queue\"]\n");

  env
    .nestack_cmd()
    .arg("--config")
    .arg(&config)
    .arg("deploy")
    .arg(fixture_path("hot_and_ordinary.yaml"))
    .args(["--stack-name", "web"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Nested templates: 2"));
}

#[test]
fn verbose_deploy_logs_resolved_settings() {
  let env = TestEnv::new();

  env
    .deploy("hot_and_ordinary.yaml", "web")
    .args(["--verbose", "--timeout", "90s"])
    .assert()
    .success()
    .stderr(predicate::str::contains("resolved deploy settings"))
    .stderr(predicate::str::contains("90s"));
}
