//! Smoke tests for the `cvbal` binary: each subcommand against the checked-in
//! two-node DRBD fixture, asserting on exit status and key output fragments
//! rather than exact byte-for-byte stdout.

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/two_node.json")
}

#[test]
fn alloc_places_a_new_single_node_instance() {
    Command::cargo_bin("cvbal")
        .unwrap()
        .args([
            "--fixture",
            fixture_path(),
            "alloc",
            "--name",
            "app-2",
            "--mem-mib",
            "2048",
            "--disk-mib",
            "10240",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("placed app-2"));
}

#[test]
fn balance_runs_to_convergence_on_a_balanced_pair() {
    Command::cargo_bin("cvbal")
        .unwrap()
        .args(["--fixture", fixture_path(), "balance", "--disk-moves", "--inst-moves"])
        .assert()
        .success();
}

#[test]
fn evacuate_reports_failure_for_an_instance_with_no_offline_node() {
    Command::cargo_bin("cvbal")
        .unwrap()
        .args(["--fixture", fixture_path(), "evacuate", "--node", "1", "--instance", "1"])
        .assert()
        .success();
}

#[test]
fn quiet_flag_suppresses_stdout() {
    Command::cargo_bin("cvbal")
        .unwrap()
        .args([
            "--fixture",
            fixture_path(),
            "--quiet",
            "alloc",
            "--name",
            "app-3",
            "--mem-mib",
            "1024",
            "--disk-mib",
            "4096",
        ])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn missing_fixture_file_is_a_clean_error_not_a_panic() {
    Command::cargo_bin("cvbal")
        .unwrap()
        .args(["--fixture", "does-not-exist.json", "alloc", "--name", "x", "--mem-mib", "1024", "--disk-mib", "1024"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cvbal: error"));
}
