use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn translate() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("adc-translate"));
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG").arg("translate");
    cmd
}

fn json_result(args: &[&str]) -> Value {
    let output = translate()
        .args(args)
        .args(["--format", "json"])
        .output()
        .expect("run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).expect("json stdout")
}

fn config<'v>(result: &'v Value, path: &str) -> &'v Value {
    result["configs"]
        .as_array()
        .and_then(|configs| configs.iter().find(|c| c["path"] == path))
        .unwrap_or_else(|| panic!("no config at {path}"))
}

#[test]
fn translate_prints_text_blocks_and_summary() {
    translate()
        .arg(fixture("fixtures/basic.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("auth partition /tenantId/ {"))
        .stdout(predicate::str::contains("ltm node /tenantId/192.0.2.4%100 {"))
        .stdout(predicate::str::contains("ltm virtual /tenantId/application/service {"))
        .stdout(predicate::str::contains("failures=0 skipped=0"));
}

#[test]
fn pool_members_land_in_the_tenant_route_domain() {
    let result = json_result(&[fixture("fixtures/basic.json").to_str().expect("utf8")]);
    let node = config(&result, "/tenantId/192.0.2.4%100");
    assert_eq!(node["command"], "ltm node");
    assert_eq!(node["properties"]["address"], "192.0.2.4%100");
    let pool = config(&result, "/tenantId/application/pool");
    assert!(pool["properties"]["members"]
        .get("/tenantId/192.0.2.4%100:80")
        .is_some());
    assert!(pool["properties"]["monitor"]
        .as_str()
        .is_some_and(|m| m.contains("/tenantId/application/mon")));
}

#[test]
fn descriptions_are_quoted_and_escaped() {
    let result = json_result(&[fixture("fixtures/basic.json").to_str().expect("utf8")]);
    assert_eq!(
        config(&result, "/tenantId/application/service")["properties"]["description"],
        "\"A description\""
    );
    assert_eq!(
        config(&result, "/tenantId/")["properties"]["description"],
        "\"Tenant \\$\\{x\\}\""
    );
}

#[test]
fn response_chunking_follows_target_version() {
    let decl = fixture("fixtures/basic.json");
    let decl = decl.to_str().expect("utf8");
    let chunking = |result: &Value| {
        config(result, "/tenantId/application/httpProf")["properties"]["response-chunking"].clone()
    };

    assert_eq!(chunking(&json_result(&[decl, "--target-version", "15.0"])), "sustain");
    assert_eq!(chunking(&json_result(&[decl, "--target-version", "14.1"])), "selective");

    let matrix = fixture("fixtures/features-14.toml");
    assert_eq!(
        chunking(&json_result(&[
            decl,
            "--target-version",
            "17.1",
            "--features-file",
            matrix.to_str().expect("utf8"),
        ])),
        "selective"
    );
}

#[test]
fn output_is_deterministic() {
    let run = || {
        translate()
            .arg(fixture("fixtures/basic.json"))
            .args(["--format", "json"])
            .output()
            .expect("run")
            .stdout
    };
    let first = run();
    assert!(!first.is_empty());
    assert_eq!(first, run());
}

#[test]
fn yaml_declaration_with_self_snat() {
    let result = json_result(&[fixture("fixtures/snat-self.yaml").to_str().expect("utf8")]);
    assert_eq!(config(&result, "/t/a/svc-self")["command"], "ltm snatpool");
    assert_eq!(
        config(&result, "/t/a/svc-1--self")["properties"]["members"],
        serde_json::json!({ "192.0.2.11": {} })
    );
    assert_eq!(
        config(&result, "/t/a/svc")["properties"]["source-address-translation"],
        serde_json::json!({ "type": "snat", "pool": "/t/a/svc-self" })
    );
}

#[test]
fn failing_items_are_listed_and_exit_nonzero() {
    translate()
        .arg(fixture("fixtures/broken.json"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("ltm pool /t/a/good {"))
        .stdout(predicate::str::contains("ltm pool /t/a/bad {").not())
        .stderr(predicate::str::contains("FAIL class=Pool path=/t/a/bad"))
        .stderr(predicate::str::contains("SKIP path=/t/a/odd"))
        .stderr(predicate::str::contains("translate failed: 1 items could not be translated"));
}

#[test]
fn waf_without_asm_is_dropped_with_a_warning() {
    translate()
        .arg(fixture("fixtures/waf.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("ltm policy /t/a/svc-waf").not())
        .stderr(predicate::str::contains("asm is not provisioned"));
}

#[test]
fn inventory_provisioning_and_access_profile_type_apply() {
    let result = json_result(&[
        fixture("fixtures/waf.json").to_str().expect("utf8"),
        "--inventory",
        fixture("fixtures/inventory.json").to_str().expect("utf8"),
    ]);
    assert_eq!(config(&result, "/t/a/svc-waf")["command"], "ltm policy");
    let profiles = &config(&result, "/t/a/svc")["properties"]["profiles"];
    for path in ["/Common/portal", "/Common/rba", "/Common/websso"] {
        assert!(profiles.get(path).is_some(), "missing {path}");
    }
}

#[test]
fn output_file_receives_json_result() {
    let dir = tempdir().expect("tempdir");
    let out = dir.path().join("result.json");
    translate()
        .arg(fixture("fixtures/basic.json"))
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("configs="));

    let written: Value = serde_json::from_str(&fs::read_to_string(&out).expect("read")).expect("json");
    assert!(written["configs"].as_array().is_some_and(|c| !c.is_empty()));
}

#[test]
fn missing_declaration_reports_context() {
    translate()
        .arg(fixture("fixtures/does-not-exist.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse"));
}
