//! Manifest load/save integration tests: error messages, atomic writes and
//! the YAML shape the job scheduler hands to agents.

use assert_fs::prelude::*;
use conform_core::{
    manifest,
    types::{Housekeeping, Manifest, SyncMethod, WorkspaceSpec},
    ManifestError,
};
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;

fn spec(identifier: &str, stream: &str) -> WorkspaceSpec {
    WorkspaceSpec {
        identifier: identifier.to_string(),
        stream: stream.to_string(),
        method: SyncMethod::Tracked,
        remove_untracked_files: false,
        view: vec![],
        server_and_port: "perforce:1666".to_string(),
        user_name: "buildmachine".to_string(),
        incremental: false,
    }
}

fn write_manifest(home: &assert_fs::TempDir, yaml: &str) -> PathBuf {
    let file = home.child(".conform/workspaces.yaml");
    file.write_str(yaml).expect("write manifest");
    file.path().to_path_buf()
}

// ---------------------------------------------------------------------------
// 1. Parsing
// ---------------------------------------------------------------------------

#[test]
fn parses_full_scheduler_manifest() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    write_manifest(
        &home,
        r#"
root_dir: /agent
remove_untracked_files: true
workspaces:
  - identifier: Main
    stream: //UE5/Main
    method: tracked
    incremental: true
    server_and_port: perforce:1666
    user_name: buildmachine
  - identifier: Release
    stream: //UE5/Release-5.4
    method: untracked
    remove_untracked_files: true
    view:
      - "-//UE5/Release-5.4/Samples/..."
    server_and_port: PERFORCE:1666
    user_name: buildmachine
housekeeping:
  metadata_subdirs: [HostWin64]
  workspace_content_dirs: [Engine/Saved/BuildGraph]
"#,
    );

    let loaded = manifest::load_at(home.path()).expect("load");
    assert_eq!(loaded.root_dir, PathBuf::from("/agent"));
    assert!(loaded.remove_untracked_files);
    assert_eq!(loaded.workspaces.len(), 2);
    assert!(loaded.workspaces[0].incremental);
    assert_eq!(loaded.workspaces[1].method, SyncMethod::Untracked);
    assert_eq!(loaded.workspaces[1].view.len(), 1);
    assert_eq!(loaded.housekeeping.metadata_subdirs, vec!["HostWin64"]);
}

#[rstest]
#[case::not_yaml_mapping("- just a list\n")]
#[case::missing_root("workspaces: []\n")]
#[case::unknown_method(
    "root_dir: /agent\nworkspaces:\n  - identifier: A\n    stream: //s\n    method: magic\n    server_and_port: p:1\n    user_name: u\n"
)]
#[case::missing_user(
    "root_dir: /agent\nworkspaces:\n  - identifier: A\n    stream: //s\n    server_and_port: p:1\n"
)]
fn malformed_manifest_is_parse_error_with_path(#[case] yaml: &str) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    write_manifest(&home, yaml);

    let err = manifest::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ManifestError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("workspaces.yaml"));
}

#[test]
fn missing_manifest_names_expected_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = manifest::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ManifestError::NotFound { .. }), "got: {err}");
    assert!(err.to_string().contains(".conform"));
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn save_cleans_up_tmp_file_and_sets_mode() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let manifest = Manifest {
        root_dir: PathBuf::from("/agent"),
        remove_untracked_files: false,
        workspaces: vec![spec("Main", "//UE5/Main")],
        housekeeping: Housekeeping::default(),
    };
    let path = manifest::save_at(home.path(), &manifest).expect("save");

    home.child(".conform/workspaces.yaml")
        .assert(predicate::path::exists());
    home.child(".conform/workspaces.yaml.tmp")
        .assert(predicate::path::missing());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&path).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "expected 0600, got {mode:o}");
    }
}

#[test]
fn housekeeping_omitted_when_empty() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let manifest = Manifest {
        root_dir: PathBuf::from("/agent"),
        remove_untracked_files: false,
        workspaces: vec![],
        housekeeping: Housekeeping::default(),
    };
    manifest::save_at(home.path(), &manifest).expect("save");

    home.child(".conform/workspaces.yaml")
        .assert(predicate::str::contains("housekeeping").not());
}
