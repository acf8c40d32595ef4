use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn conform_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("conform"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("RUST_LOG", "warn");
    cmd
}

fn write_manifest(dir: &Path, root: &Path, workspaces: &str) -> PathBuf {
    let path = dir.join("workspaces.yaml");
    let yaml = format!(
        "root_dir: {}\nremove_untracked_files: false\nworkspaces:{workspaces}\n",
        root.display()
    );
    fs::write(&path, yaml).expect("write manifest");
    path
}

const TWO_WORKSPACES: &str = r#"
  - identifier: Main
    stream: //UE5/Main
    server_and_port: perforce:1666
    user_name: build
  - identifier: Main
    stream: //UE5/Main
    method: untracked
    server_and_port: perforce:1666
    user_name: build
  - identifier: Tools
    stream: //UE5/Tools
    server_and_port: perforce:1666
    user_name: build"#;

#[test]
fn plan_json_lists_clients_and_groups() {
    let home = TempDir::new().expect("home");
    let root = TempDir::new().expect("root");
    let manifest = write_manifest(home.path(), root.path(), TWO_WORKSPACES);

    let output = conform_cmd(home.path())
        .args(["plan", "--json", "--host", "build-01", "--manifest"])
        .arg(&manifest)
        .output()
        .expect("run conform plan");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).expect("plan JSON");
    let clients: Vec<&str> = plan["workspaces"]
        .as_array()
        .expect("workspaces")
        .iter()
        .map(|w| w["client_name"].as_str().expect("client_name"))
        .collect();
    assert_eq!(
        clients,
        vec![
            "Conform+BUILD-01+Main",
            "Conform+BUILD-01+Main+NoHave",
            "Conform+BUILD-01+Tools"
        ]
    );
    let strategies: Vec<&str> = plan["groups"]
        .as_array()
        .expect("groups")
        .iter()
        .map(|g| g["strategy"].as_str().expect("strategy"))
        .collect();
    assert_eq!(strategies, vec!["populate", "simple"]);
}

#[test]
fn plan_table_shows_protected_dirs() {
    let home = TempDir::new().expect("home");
    let root = TempDir::new().expect("root");
    let manifest = write_manifest(home.path(), root.path(), TWO_WORKSPACES);

    conform_cmd(home.path())
        .args(["plan", "--host", "build-01", "--manifest"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(contains("Conform+BUILD-01+Tools"))
        .stdout(contains("Protected directories:"))
        .stdout(contains(root.path().join("Saved").display().to_string()));
}

#[test]
fn remove_untracked_flag_drops_temp_protection() {
    let home = TempDir::new().expect("home");
    let root = TempDir::new().expect("root");
    let manifest = write_manifest(home.path(), root.path(), TWO_WORKSPACES);

    let output = conform_cmd(home.path())
        .args(["plan", "--json", "--remove-untracked", "--host", "h", "--manifest"])
        .arg(&manifest)
        .output()
        .expect("run conform plan");
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).expect("plan JSON");
    let protected = plan["protected_dirs"].as_array().expect("protected");
    assert_eq!(protected.len(), 2);
    assert!(plan["groups"]
        .as_array()
        .expect("groups")
        .iter()
        .all(|g| g["strategy"] == "populate"));
}

#[test]
fn plan_uses_default_manifest_under_home() {
    let home = TempDir::new().expect("home");
    let root = TempDir::new().expect("root");
    let dir = home.path().join(".conform");
    fs::create_dir_all(&dir).expect("mkdir");
    write_manifest(&dir, root.path(), TWO_WORKSPACES);

    conform_cmd(home.path())
        .args(["plan", "--host", "build-01"])
        .assert()
        .success()
        .stdout(contains("Conform+BUILD-01+Main"));
}

#[test]
fn missing_manifest_is_reported() {
    let home = TempDir::new().expect("home");
    conform_cmd(home.path())
        .args(["plan"])
        .assert()
        .failure()
        .stderr(contains("failed to load manifest"))
        .stderr(contains("workspaces.yaml"));
}

#[test]
fn relative_root_override_is_rejected() {
    let home = TempDir::new().expect("home");
    let root = TempDir::new().expect("root");
    let manifest = write_manifest(home.path(), root.path(), TWO_WORKSPACES);

    conform_cmd(home.path())
        .args(["plan", "--root", "agent", "--manifest"])
        .arg(&manifest)
        .assert()
        .failure()
        .stderr(contains("--root must be an absolute path"));
}

#[test]
fn run_with_no_workspaces_cleans_root_without_a_server() {
    let home = TempDir::new().expect("home");
    let root = TempDir::new().expect("root");
    fs::create_dir_all(root.path().join("OldJob/Sync")).expect("mkdir");
    fs::create_dir_all(root.path().join("Saved")).expect("mkdir");
    let manifest = write_manifest(home.path(), root.path(), " []");

    conform_cmd(home.path())
        .args(["run", "--p4", "/nonexistent/p4", "--manifest"])
        .arg(&manifest)
        .assert()
        .success();

    assert!(!root.path().join("OldJob").exists());
    assert!(root.path().join("Saved").is_dir());
}

#[test]
fn run_fails_when_p4_is_missing() {
    let home = TempDir::new().expect("home");
    let root = TempDir::new().expect("root");
    fs::create_dir_all(root.path().join("OldJob")).expect("mkdir");
    let manifest = write_manifest(home.path(), root.path(), TWO_WORKSPACES);

    conform_cmd(home.path())
        .args(["run", "--p4", "/nonexistent/p4", "--manifest"])
        .arg(&manifest)
        .assert()
        .failure()
        .stderr(contains("conform pass failed"))
        .stderr(contains("failed to set up workspace 'Main'"));

    assert!(root.path().join("OldJob").is_dir());
}
