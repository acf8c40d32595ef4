//! WorkspaceMaterializer: turn one desired [`WorkspaceSpec`] into a live
//! [`WorkspaceState`] bound to a client record.
//!
//! Layout is a pure function of `(root_dir, identifier, host, method)`, so
//! materializing the same spec twice reattaches to the same client instead of
//! creating a second one.

use std::path::{Path, PathBuf};

use conform_core::{
    paths, ClientTemplate, ConformError, WorkspaceSpec, WorkspaceState,
};

use crate::context::ConformContext;
use crate::vcs::VcsConnection;

const CLIENT_PREFIX: &str = "Conform";
const NO_HAVE_SUFFIX: &str = "+NoHave";

/// Where a workspace lives and what its client is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub client_name: String,
    pub metadata_dir: PathBuf,
    pub workspace_dir: PathBuf,
}

/// Client name for a workspace on `host`.
///
/// `Conform+{HOST}+{identifier}`, with `+NoHave` appended when the backend
/// keeps no have-table for the client.
pub fn client_name(host: &str, identifier: &str, use_have_table: bool) -> String {
    let mut name = format!("{CLIENT_PREFIX}+{}+{identifier}", escape_host(host));
    if !use_have_table {
        name.push_str(NO_HAVE_SUFFIX);
    }
    name
}

fn escape_host(host: &str) -> String {
    host.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c.to_ascii_uppercase()
            } else {
                '-'
            }
        })
        .collect()
}

/// Resolve paths and client name without touching the backend.
///
/// Fails with `WorkspaceSetup` if `root_dir` is not absolute or if the
/// identifier would place the workspace anywhere but directly under it.
pub fn resolve_layout(
    spec: &WorkspaceSpec,
    root_dir: &Path,
    host: &str,
) -> Result<WorkspaceLayout, ConformError> {
    let root = paths::normalize(root_dir).ok_or_else(|| {
        ConformError::setup(
            &spec.identifier,
            format!("agent root '{}' is not an absolute path", root_dir.display()),
        )
    })?;
    if !paths::is_single_component(&spec.identifier) {
        return Err(ConformError::setup(
            &spec.identifier,
            format!(
                "identifier does not resolve to a directory under '{}'",
                root.display()
            ),
        ));
    }

    let metadata_dir = root.join(&spec.identifier);
    let workspace_dir = metadata_dir.join(paths::SYNC_DIR_NAME);
    if !paths::is_under_dir(&workspace_dir, &root) {
        return Err(ConformError::setup(
            &spec.identifier,
            format!(
                "workspace '{}' is not under '{}'",
                workspace_dir.display(),
                root.display()
            ),
        ));
    }

    Ok(WorkspaceLayout {
        client_name: client_name(host, &spec.identifier, spec.method.uses_have_table()),
        metadata_dir,
        workspace_dir,
    })
}

/// Build the state a spec would materialize to, using the workspace's declared view.
///
/// Used when the backend is not consulted (planning); [`materialize`]
/// replaces the view with the one the backend resolves.
pub fn offline_state(spec: &WorkspaceSpec, layout: WorkspaceLayout) -> WorkspaceState {
    WorkspaceState {
        identifier: spec.identifier.clone(),
        client_name: layout.client_name,
        server_and_port: spec.server_and_port.clone(),
        user_name: spec.user_name.clone(),
        workspace_dir: layout.workspace_dir,
        metadata_dir: layout.metadata_dir,
        stream: spec.stream.clone(),
        stream_view: spec.view.clone(),
        remove_untracked_files: spec.remove_untracked_files,
        use_have_table: spec.method.uses_have_table(),
    }
}

/// Bind or create the client for `spec` on `connection` and return its state.
///
/// May create the workspace's own client record; never deletes or edits any
/// other record.
pub async fn materialize(
    spec: &WorkspaceSpec,
    root_dir: &Path,
    connection: &mut dyn VcsConnection,
    ctx: &ConformContext,
) -> Result<WorkspaceState, ConformError> {
    ctx.checkpoint()?;
    let info = connection
        .backend_info()
        .await
        .map_err(|e| ConformError::setup_backend(&spec.identifier, e))?;

    let layout = resolve_layout(spec, root_dir, &info.local_host)?;
    let template = ClientTemplate {
        name: layout.client_name.clone(),
        owner: spec.user_name.clone(),
        host: info.local_host,
        root: layout.workspace_dir.clone(),
        stream: spec.stream.clone(),
        view: spec.view.clone(),
        use_have_table: spec.method.uses_have_table(),
    };

    ctx.checkpoint()?;
    let binding = connection
        .ensure_client(&template)
        .await
        .map_err(|e| ConformError::setup_backend(&spec.identifier, e))?;
    if binding.created {
        tracing::info!(client = %template.name, root = %template.root.display(), "created client");
    } else {
        tracing::debug!(client = %template.name, "reattached to existing client");
    }

    let mut state = offline_state(spec, layout);
    state.stream_view = binding.stream_view;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conform_core::SyncMethod;
    use rstest::rstest;

    fn spec(identifier: &str, method: SyncMethod) -> WorkspaceSpec {
        WorkspaceSpec {
            identifier: identifier.to_string(),
            stream: "//UE5/Main".to_string(),
            method,
            remove_untracked_files: false,
            view: vec![],
            server_and_port: "perforce:1666".to_string(),
            user_name: "buildmachine".to_string(),
            incremental: false,
        }
    }

    #[test]
    fn client_name_escapes_host_and_marks_untracked() {
        assert_eq!(client_name("build-01.corp", "Main", true), "Conform+BUILD-01-CORP+Main");
        assert_eq!(
            client_name("build-01", "Main", false),
            "Conform+BUILD-01+Main+NoHave"
        );
    }

    #[test]
    fn layout_is_deterministic() {
        let a = resolve_layout(&spec("Main", SyncMethod::Tracked), Path::new("/agent"), "h")
            .expect("layout");
        let b = resolve_layout(&spec("Main", SyncMethod::Tracked), Path::new("/agent/"), "h")
            .expect("layout");
        assert_eq!(a, b);
        assert_eq!(a.metadata_dir, PathBuf::from("/agent/Main"));
        assert_eq!(a.workspace_dir, PathBuf::from("/agent/Main/Sync"));
    }

    #[rstest]
    #[case("..")]
    #[case("../escape")]
    #[case("nested/dir")]
    #[case("/abs")]
    #[case("")]
    fn identifiers_outside_root_are_rejected(#[case] identifier: &str) {
        let err = resolve_layout(&spec(identifier, SyncMethod::Tracked), Path::new("/agent"), "h")
            .unwrap_err();
        assert!(matches!(err, ConformError::WorkspaceSetup { .. }), "got: {err}");
    }

    #[test]
    fn relative_root_is_rejected() {
        let err = resolve_layout(&spec("Main", SyncMethod::Tracked), Path::new("agent"), "h")
            .unwrap_err();
        assert!(err.to_string().contains("not an absolute path"));
    }
}
