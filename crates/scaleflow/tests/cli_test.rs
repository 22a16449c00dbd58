#![allow(deprecated)] // TODO: move from cargo_bin to cargo_bin_cmd!

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const COLLECTOR: &str = r#"
topology "storm-collector" {
    regions "eu-west-1a" "eu-west-1b" "eu-west-1c"
    load-balancer "StormTestCollector" {
        listener external=80 internal=80 protocol="tcp"
        listener external=443 internal=443 protocol="tcp"
        health-check target-port=80 interval=30 healthy=3 unhealthy=5 timeout=2
    }
    launch-template "ctLaunchConfig" {
        image "ami-93b087e7"
        instance-type "t1.micro"
        credential "default-TVT-ec2key"
        security-groups "StormTest-Collector-WebApp"
        volume "/dev/sdc" kind="ephemeral"
        volume "/dev/sdh" kind="persistent" size=100
    }
    scaling-group "ctScalingGroup" {
        capacity min=2 max=6 desired=2
        cooldown 300
    }
    policy "ctScaleUp" direction="up" delta=2 cooldown=180
    policy "ctScaleDown" direction="down" delta=-1 cooldown=180
    alarm "ctScaleAlarm-HighCPU" {
        metric "CPUUtilization" namespace="AWS/EC2"
        when ">" 70
        policy "ctScaleUp"
    }
    alarm "ctScaleAlarm-LowCPU" {
        metric "CPUUtilization" namespace="AWS/EC2"
        when "<=" 30
        policy "ctScaleDown"
    }
}
"#;

/// Project directory holding `topology.kdl`
fn project(topology: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("topology.kdl"), topology).unwrap();
    dir
}

/// `scale` running inside `dir`, isolated from the user's config and env
fn scale(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("scale").unwrap();
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join("xdg"))
        .env("SCALEFLOW_STATE_DIR", dir.join("state"))
        .env_remove("SCALEFLOW_CONFIG")
        .env_remove("SCALEFLOW_TOPOLOGY")
        .env_remove("SCALEFLOW_REGION")
        .env_remove("RUST_LOG");
    cmd
}

/// CLI help lists every subcommand
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("scale").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("destroy"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("scale").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("scaleflow"));
}

#[test]
fn test_apply_help() {
    let mut cmd = Command::cargo_bin("scale").unwrap();
    cmd.arg("apply")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--file"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("scale").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

#[test]
fn test_validate_valid_topology() {
    let dir = project(COLLECTOR);
    scale(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Topology is valid"))
        .stdout(predicate::str::contains("storm-collector"))
        .stdout(predicate::str::contains("ctLaunchConfig-"));
}

/// Violations exit with 3 and name the offending field
#[test]
fn test_validate_reports_violations() {
    let dir = project(&COLLECTOR.replace("desired=2", "desired=10"));
    scale(dir.path())
        .arg("validate")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("desiredCapacity"));
}

/// apply validates before touching the provider
#[test]
fn test_apply_invalid_topology_exits_with_validation_code() {
    let dir = project(&COLLECTOR.replace("desired=2", "desired=10"));
    scale(dir.path())
        .arg("apply")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("desiredCapacity"));
    assert!(!dir.path().join("state/inventory.json").exists());
}

#[test]
fn test_validate_without_topology_file() {
    let dir = tempfile::tempdir().unwrap();
    scale(dir.path()).arg("validate").assert().failure();
}

#[test]
fn test_validate_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("collector.kdl");
    fs::write(&file, COLLECTOR).unwrap();

    scale(dir.path())
        .arg("validate")
        .arg("-f")
        .arg(&file)
        .assert()
        .success();
}

#[test]
fn test_plan_fresh_state() {
    let dir = project(COLLECTOR);
    scale(dir.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("create load-balancer StormTestCollector"))
        .stdout(predicate::str::contains("7 to create, 0 to update, 0 to delete"));

    // plan never writes provider state
    assert!(!dir.path().join("state/inventory.json").exists());
}

#[test]
fn test_plan_json() {
    let dir = project(COLLECTOR);
    let output = scale(dir.path())
        .arg("plan")
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let plans: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(plans[0]["topology"], "storm-collector");
    assert_eq!(plans[0]["plan"]["actions"].as_array().unwrap().len(), 7);
    assert_eq!(
        plans[0]["plan"]["actions"][0]["type"],
        "create_load_balancer"
    );
}

#[test]
fn test_apply_then_plan_has_no_changes() {
    let dir = project(COLLECTOR);
    scale(dir.path())
        .arg("apply")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("converged"));
    assert!(dir.path().join("state/inventory.json").exists());

    scale(dir.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes"));

    scale(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("stormtestcollector.eu-west-1.elb.scaleflow.local"))
        .stdout(predicate::str::contains("in sync"));
}

#[test]
fn test_capacity_change_plans_single_update() {
    let dir = project(COLLECTOR);
    scale(dir.path()).arg("apply").assert().success();

    fs::write(
        dir.path().join("topology.kdl"),
        COLLECTOR.replace("desired=2", "desired=4"),
    )
    .unwrap();
    scale(dir.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "update scaling-group ctScalingGroup (desiredCapacity: 2→4)",
        ))
        .stdout(predicate::str::contains("0 to create, 1 to update, 0 to delete"));
}

#[test]
fn test_destroy_removes_resources() {
    let dir = project(COLLECTOR);
    scale(dir.path()).arg("apply").assert().success();

    scale(dir.path())
        .arg("destroy")
        .arg("--json")
        .assert()
        .code(0);

    scale(dir.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("7 to create"));

    scale(dir.path())
        .arg("destroy")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to destroy"));
}

/// A live run lock makes apply fail without touching anything
#[test]
fn test_apply_refuses_locked_topology() {
    let dir = project(COLLECTOR);
    let locks = dir.path().join("state/locks");
    fs::create_dir_all(&locks).unwrap();
    fs::write(
        locks.join("storm-collector.lock"),
        r#"{"topology":"storm-collector","holder":"ci-runner","pid":4242,"acquired_at":"2999-01-01T00:00:00Z"}"#,
    )
    .unwrap();

    scale(dir.path())
        .arg("apply")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("locked by ci-runner"));
    assert!(!dir.path().join("state/inventory.json").exists());
}

/// --state-dir wins over SCALEFLOW_STATE_DIR
#[test]
fn test_state_dir_flag() {
    let dir = project(COLLECTOR);
    scale(dir.path())
        .arg("--state-dir")
        .arg(dir.path().join("elsewhere"))
        .arg("apply")
        .assert()
        .success();

    assert!(dir.path().join("elsewhere/inventory.json").exists());
    assert!(!dir.path().join("state/inventory.json").exists());
}
