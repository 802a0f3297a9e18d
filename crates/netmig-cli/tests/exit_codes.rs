mod common;

use common::{netmig_cmd, parse_json};

#[test]
fn invalid_repository_url_is_a_user_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let assert = netmig_cmd()
        .args(["--json", "analyze", "--repo", "not a url", "--output"])
        .arg(temp.path().join("report"))
        .assert()
        .code(1);
    let payload = parse_json(&assert);
    assert_eq!(payload["status"], "user-error");
    assert_eq!(payload["details"]["reason"], "invalid_repository_url");
    assert!(!temp.path().join("report").exists());
}

#[test]
fn missing_checkout_directory_is_a_user_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let assert = netmig_cmd()
        .args(["analyze", "--path"])
        .arg(temp.path().join("missing"))
        .assert()
        .code(1);
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr);
    assert!(stderr.contains("is not a directory"), "{stderr}");
}

#[test]
fn unsupported_target_framework_is_a_user_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    netmig_cmd()
        .args(["analyze", "--target-framework", "netcoreapp3.1", "--path"])
        .arg(temp.path())
        .assert()
        .code(1);
}

#[test]
fn conflicting_sources_are_rejected_by_the_parser() {
    netmig_cmd()
        .args(["analyze", "--repo", "https://dev.example.com/org/app.git", "--path", "."])
        .assert()
        .code(2);
}

#[cfg(unix)]
#[test]
fn clone_without_git_is_a_setup_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let empty = tempfile::tempdir().expect("tempdir");
    let assert = netmig_cmd()
        .args(["--json", "analyze", "--repo", "https://dev.example.com/org/app.git", "--pat", "tok3n"])
        .arg("--output")
        .arg(temp.path().join("report"))
        .env("PATH", empty.path())
        .assert()
        .code(2);
    let payload = parse_json(&assert);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["details"]["reason"], "setup_failed");
    assert!(!String::from_utf8_lossy(&assert.get_output().stdout).contains("tok3n"));
}
