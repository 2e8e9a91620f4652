use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

const TOPOLOGY: &str = r#"
pools:
  - name: offsite
    transport:
      ssh:
        host: offsite.example.com
        user: root
  - name: mirror
    transport:
      local: {}
pushs:
  - to: offsite
    datasets: [tank/home]
pulls:
  - from: offsite
    mapping:
      "tank/src*": "backup/offsite"
sinks:
  - from: laptop
    mapping:
      "|laptop": "backup/laptop"
"#;

fn topology_dir(yaml: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("dsrepl.yaml"), yaml).unwrap();
    dir
}

#[test]
fn test_validate_ok() {
    let dir = topology_dir(TOPOLOGY);

    cargo_bin_cmd!("dsrepl")
        .args(["--config", dir.path().to_str().unwrap(), "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "ok: 2 pools, 1 pushs, 1 pulls, 1 sinks",
        ));
}

#[test]
fn test_validate_reports_dangling_reference() {
    let dir = topology_dir("pulls:\n  - from: missing\n    mapping: {\"tank*\": backup}\n");

    cargo_bin_cmd!("dsrepl")
        .args(["--config", dir.path().to_str().unwrap(), "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pool 'missing' not defined"));
}

#[test]
fn test_validate_missing_file() {
    let dir = tempfile::tempdir().unwrap();

    cargo_bin_cmd!("dsrepl")
        .args(["--config", dir.path().to_str().unwrap(), "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn test_pools_lists_transports() {
    let dir = topology_dir(TOPOLOGY);

    cargo_bin_cmd!("dsrepl")
        .args(["--config", dir.path().to_str().unwrap(), "pools"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "offsite\tssh root@offsite.example.com:22",
        ))
        .stdout(predicate::str::contains("mirror\tlocal"));
}

#[test]
fn test_map_through_pull() {
    let dir = topology_dir(TOPOLOGY);

    cargo_bin_cmd!("dsrepl")
        .args([
            "--config",
            dir.path().to_str().unwrap(),
            "map",
            "--pull",
            "offsite",
            "tank/src/home",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "tank/src/home -> backup/offsite/home",
        ));
}

#[test]
fn test_map_through_sink() {
    let dir = topology_dir(TOPOLOGY);

    cargo_bin_cmd!("dsrepl")
        .args([
            "--config",
            dir.path().to_str().unwrap(),
            "map",
            "--sink",
            "laptop",
            "zroot/usr",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("zroot/usr -> backup/laptop"));
}

#[test]
fn test_map_no_rule_matched() {
    let dir = topology_dir(TOPOLOGY);

    cargo_bin_cmd!("dsrepl")
        .args([
            "--config",
            dir.path().to_str().unwrap(),
            "map",
            "--pull",
            "offsite",
            "zroot/var",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no mapping rule matched"));
}

#[test]
fn test_map_requires_relationship() {
    let dir = topology_dir(TOPOLOGY);

    cargo_bin_cmd!("dsrepl")
        .args(["--config", dir.path().to_str().unwrap(), "map", "tank/a"])
        .assert()
        .failure();
}
