use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn crd_command_prints_both_versions() {
    let mut cmd = Command::cargo_bin("mysql-operator").unwrap();
    cmd.args(["crd"]).assert().success()
        .stdout(predicate::str::contains("name: mysqls.mysql.sample.com"))
        .stdout(predicate::str::contains("name: v1alpha1"))
        .stdout(predicate::str::contains("name: v1alpha2"));
}

#[test]
fn crd_command_wires_conversion_webhook() {
    let mut cmd = Command::cargo_bin("mysql-operator").unwrap();
    cmd.args(["crd", "--service-namespace", "mysql-system", "--service-name", "mysql-operator"]).assert().success()
        .stdout(predicate::str::contains("strategy: Webhook"))
        .stdout(predicate::str::contains("path: /convert"));
}

#[test]
fn crd_gen_matches_plain_output() {
    let mut cmd = Command::cargo_bin("crd-gen").unwrap();
    cmd.assert().success().stdout(predicate::str::contains("kind: CustomResourceDefinition"));
}

#[test]
fn bad_config_exits_with_code_two() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("mysql-operator").unwrap();
    cmd.args(["webhook", "--config"]).arg(dir.path().join("missing.toml"))
        .assert().code(2).stderr(predicate::str::contains("failed to read config"));
}
