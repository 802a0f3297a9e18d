#![allow(dead_code)]

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use assert_cmd::assert::Assert;
use assert_cmd::cargo::cargo_bin_cmd;
use httptest::{matchers::*, responders::*, Expectation, Server};
use serde_json::{json, Value};
use tempfile::TempDir;

/// `netmig` with registry traffic pinned away from any ambient proxy so the
/// local test registries are reached directly.
pub fn netmig_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("netmig");
    cmd.env("NETMIG_KEEP_PROXIES", "0")
        .env_remove("NETMIG_PRIVATE_SOURCE")
        .env_remove("NETMIG_TARGET_FRAMEWORK");
    cmd
}

pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

pub fn fixture_source() -> PathBuf {
    workspace_root().join("fixtures").join("sample_solution")
}

/// Copies the sample solution into a fresh temp dir so runs can rewrite it.
pub fn prepare_fixture(prefix: &str) -> (TempDir, PathBuf) {
    let temp = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("tempdir");
    let dst = temp.path().join("sample_solution");
    copy_dir_all(&fixture_source(), &dst).expect("copy fixture");
    (temp, dst)
}

fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_all(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}

fn registration(versions: &[(&str, &[&str])]) -> Value {
    let leaves: Vec<Value> = versions
        .iter()
        .map(|(version, frameworks)| {
            let groups: Vec<Value> = frameworks
                .iter()
                .map(|tfm| json!({ "targetFramework": tfm }))
                .collect();
            json!({ "catalogEntry": { "version": version, "dependencyGroups": groups } })
        })
        .collect();
    json!({ "items": [{ "@id": "page-0", "items": leaves }] })
}

/// Public registry knowing the packages the sample solution references.
pub fn public_registry() -> Server {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            "/v3/registration5-semver1/newtonsoft.json/index.json",
        ))
        .respond_with(json_encoded(registration(&[
            ("12.0.1", &[".NETFramework4.5", ".NETStandard2.0"]),
            ("13.0.3", &[".NETFramework4.5", ".NETStandard2.0", "net6.0"]),
        ]))),
    );
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            "/v3/registration5-semver1/serilog/index.json",
        ))
        .respond_with(json_encoded(registration(&[
            ("2.10.0", &[".NETFramework4.5", ".NETStandard2.0"]),
            ("3.1.1", &[".NETStandard2.0", "net6.0"]),
        ]))),
    );
    server
}

/// Private feed under `/feed` that only knows `Internal.Billing`.
pub fn private_registry() -> Server {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            "/feed/v3/registration5-semver1/internal.billing/index.json",
        ))
        .respond_with(json_encoded(registration(&[
            ("1.2.0", &[".NETStandard2.0"]),
            ("1.4.0", &["net8.0"]),
        ]))),
    );
    server
}

/// Directory holding a `dotnet` stand-in that succeeds for every subcommand
/// except those matching `failing` (a shell `case` pattern).
#[cfg(unix)]
pub fn fake_dotnet_dir(failing: &str) -> TempDir {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("dotnet");
    let script = format!(
        "#!/bin/sh\necho \"dotnet $*\"\ncase \"$1\" in {failing}) echo 'error NU1101: unable to find package' >&2; exit 1;; esac\nexit 0\n"
    );
    fs::write(&path, script).expect("write fake dotnet");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
    dir
}
