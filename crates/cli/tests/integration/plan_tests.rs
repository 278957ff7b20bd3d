//! Plan command integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, fixture_path};

#[test]
fn plan_lists_nested_templates() {
  let env = TestEnv::new();

  env
    .nestack_cmd()
    .arg("plan")
    .arg(fixture_path("hot_and_ordinary.yaml"))
    .assert()
    .success()
    .stdout(predicate::str::contains("5 resources split into 1 nested template(s)"))
    .stdout(predicate::str::contains("AWSECSServiceNestedStack"))
    .stdout(predicate::str::contains("template.AWSECSService.yaml"));
}

#[test]
fn plan_without_hot_types_keeps_everything_in_root() {
  let env = TestEnv::new();

  env
    .nestack_cmd()
    .arg("plan")
    .arg(fixture_path("ordinary_only.yaml"))
    .assert()
    .success()
    .stdout(predicate::str::contains("3 resources split into 0 nested template(s)"));
}

#[test]
fn plan_does_not_touch_state() {
  let env = TestEnv::new();

  env
    .nestack_cmd()
    .arg("plan")
    .arg(fixture_path("hot_and_ordinary.yaml"))
    .assert()
    .success();

  assert!(!env.artifacts_path().exists());
  assert!(!env.state_path().join("stacks").exists());
}

#[test]
fn plan_json_output() {
  let env = TestEnv::new();

  let output = env
    .nestack_cmd()
    .arg("plan")
    .arg(fixture_path("hot_and_ordinary.yaml"))
    .args(["--output", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["resources"], 5);
  assert_eq!(json["root"]["key"], "template.yaml");
  assert_eq!(json["nested"].as_array().unwrap().len(), 1);
  assert_eq!(json["nested"][0]["partition"], "AWSECSService");
  assert_eq!(json["nested"][0]["resources"], serde_json::json!(["Web"]));
}

#[test]
fn plan_writes_templates_to_directory() {
  let env = TestEnv::new();
  let out = env.temp.path().join("out");

  env
    .nestack_cmd()
    .arg("plan")
    .arg(fixture_path("hot_and_ordinary.yaml"))
    .arg("--out")
    .arg(&out)
    .assert()
    .success()
    .stdout(predicate::str::contains("Wrote 2 template(s)"));

  let root = std::fs::read_to_string(out.join("template.yaml")).unwrap();
  assert!(root.contains("AWSECSServiceNestedStack"));
  assert!(root.contains("TemplateURL: template.AWSECSService.yaml"));
  assert!(!root.contains("AWS::ECS::Service"));

  let nested = std::fs::read_to_string(out.join("template.AWSECSService.yaml")).unwrap();
  assert!(nested.contains("AWS::ECS::Service"));
  assert!(nested.contains("DesiredCount: 2"));
}

#[test]
fn plan_per_type_from_flag() {
  let env = TestEnv::new();

  env
    .nestack_cmd()
    .arg("plan")
    .arg(fixture_path("ordinary_only.yaml"))
    .arg("--per-type")
    .assert()
    .success()
    .stdout(predicate::str::contains("3 resources split into 3 nested template(s)"));
}

#[test]
fn plan_extra_split_type_from_flag() {
  let env = TestEnv::new();

  env
    .nestack_cmd()
    .arg("plan")
    .arg(fixture_path("ordinary_only.yaml"))
    .args(["--split-type", "AWS::SNS::Topic"])
    .assert()
    .success()
    .stdout(predicate::str::contains("3 resources split into 1 nested template(s)"))
    .stdout(predicate::str::contains("AWSSNSTopicNestedStack"));
}

#[test]
fn plan_empty_template_fails() {
  let env = TestEnv::new();

  env
    .nestack_cmd()
    .arg("plan")
    .arg(fixture_path("empty.yaml"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("template declares no resources"));
}
