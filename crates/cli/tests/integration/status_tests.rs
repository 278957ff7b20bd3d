//! Status command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn status_after_create() {
  let env = TestEnv::new();
  env.deploy("hot_and_ordinary.yaml", "web").assert().success();

  env
    .nestack_cmd()
    .args(["status", "--stack-name", "web"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Stack web: CREATE_COMPLETE"))
    .stdout(predicate::str::contains("Nested templates: 1"))
    .stdout(predicate::str::contains("AWSECSServiceNestedStack (1 resources)"));
}

#[test]
fn status_after_update_shows_proposals() {
  let env = TestEnv::new();
  env.deploy("hot_and_ordinary.yaml", "web").assert().success();
  env.deploy("hot_and_ordinary.yaml", "web").assert().failure();
  env.deploy("hot_and_ordinary_v2.yaml", "web").assert().success();

  env
    .nestack_cmd()
    .args(["status", "--stack-name", "web", "--verbose"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Stack web: UPDATE_COMPLETE"))
    .stdout(predicate::str::contains("Last proposal: Update-"))
    .stdout(predicate::str::contains("No updates are to be performed."));
}

#[test]
fn status_json_output() {
  let env = TestEnv::new();
  env.deploy("hot_and_ordinary.yaml", "web").assert().success();
  env.deploy("hot_and_ordinary_v2.yaml", "web").assert().success();

  let output = env
    .nestack_cmd()
    .args(["status", "--stack-name", "web", "--output", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["stack"]["stack_name"], "web");
  assert_eq!(json["stack"]["status"], "UPDATE_COMPLETE");
  assert_eq!(json["proposals"].as_array().unwrap().len(), 1);
}

#[test]
fn status_of_unknown_stack_fails() {
  let env = TestEnv::new();

  env
    .nestack_cmd()
    .args(["status", "--stack-name", "ghost"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("does not exist"));
}
