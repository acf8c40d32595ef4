//! FleetScanner: enumerate the clients a backend knows about and decide which
//! ones this agent owns but no longer wants.
//!
//! A client is an orphan iff all of these hold:
//! 1. its host equals the backend-reported local host (case-insensitive);
//! 2. its server id is empty or equals the backend-reported one (case-insensitive);
//! 3. its root parses to a path strictly under the agent root;
//! 4. its name matches no kept workspace client (case-insensitive).
//!
//! A root that does not parse is left alone: ambiguous state is never destroyed.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use conform_core::{paths, BackendInfo, ClientRoot, ConformError, RemoteClient, WorkspaceState};

use crate::context::ConformContext;
use crate::vcs::VcsConnection;

/// Why a listed client is or is not an orphan. Conditions are checked in the
/// order of the module docs; the first that fails names the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientVerdict {
    Orphan,
    ForeignHost,
    ForeignServer,
    UnparseableRoot,
    OutsideRoot,
    Kept,
}

impl fmt::Display for ClientVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClientVerdict::Orphan => "orphan",
            ClientVerdict::ForeignHost => "foreign host",
            ClientVerdict::ForeignServer => "foreign server",
            ClientVerdict::UnparseableRoot => "unparseable root",
            ClientVerdict::OutsideRoot => "outside root",
            ClientVerdict::Kept => "kept",
        };
        f.write_str(s)
    }
}

/// Client names the pass keeps, compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct KeptClients(HashSet<String>);

impl KeptClients {
    pub fn from_states(states: &[WorkspaceState]) -> Self {
        Self::from_names(states.iter().map(|s| s.client_name.as_str()))
    }

    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self(names.into_iter().map(str::to_lowercase).collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(&name.to_lowercase())
    }
}

/// One listed client with its verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedClient {
    pub client: RemoteClient,
    pub verdict: ClientVerdict,
}

/// Everything one connection reported during a scan.
#[derive(Debug, Clone)]
pub struct FleetScan {
    pub info: BackendInfo,
    pub clients: Vec<ClassifiedClient>,
}

impl FleetScan {
    pub fn orphans(&self) -> impl Iterator<Item = &RemoteClient> {
        self.clients
            .iter()
            .filter(|c| c.verdict == ClientVerdict::Orphan)
            .map(|c| &c.client)
    }
}

pub fn classify(
    client: &RemoteClient,
    info: &BackendInfo,
    root_dir: &Path,
    kept: &KeptClients,
) -> ClientVerdict {
    if !client.host.eq_ignore_ascii_case(&info.local_host) {
        return ClientVerdict::ForeignHost;
    }

    let client_server = client.server_id.as_deref().unwrap_or("");
    let local_server = info.server_id.as_deref().unwrap_or("");
    if !client_server.is_empty() && !client_server.eq_ignore_ascii_case(local_server) {
        return ClientVerdict::ForeignServer;
    }

    match ClientRoot::parse(&client.root) {
        ClientRoot::Unparseable => return ClientVerdict::UnparseableRoot,
        ClientRoot::Valid(root) if !paths::is_under_dir(&root, root_dir) => {
            return ClientVerdict::OutsideRoot
        }
        ClientRoot::Valid(_) => {}
    }

    if kept.contains(&client.name) {
        return ClientVerdict::Kept;
    }
    ClientVerdict::Orphan
}

pub fn classify_clients(
    clients: Vec<RemoteClient>,
    info: &BackendInfo,
    root_dir: &Path,
    kept: &KeptClients,
) -> Vec<ClassifiedClient> {
    clients
        .into_iter()
        .map(|client| {
            let verdict = classify(&client, info, root_dir, kept);
            ClassifiedClient { client, verdict }
        })
        .collect()
}

/// Query backend identity, list the connecting user's clients, classify them.
pub async fn scan(
    connection: &mut dyn VcsConnection,
    root_dir: &Path,
    kept: &KeptClients,
    ctx: &ConformContext,
) -> Result<FleetScan, ConformError> {
    let server = connection.settings().server_and_port.clone();
    ctx.checkpoint()?;
    let info = connection
        .backend_info()
        .await
        .map_err(|source| ConformError::Enumeration { server, source })?;
    scan_with_info(connection, info, root_dir, kept, ctx).await
}

/// [`scan`] for a caller that already holds the backend's identity.
pub async fn scan_with_info(
    connection: &mut dyn VcsConnection,
    info: BackendInfo,
    root_dir: &Path,
    kept: &KeptClients,
    ctx: &ConformContext,
) -> Result<FleetScan, ConformError> {
    let server = connection.settings().server_and_port.clone();
    let owner = connection.settings().user_name.clone();

    ctx.checkpoint()?;
    let listed = connection
        .list_clients(&owner)
        .await
        .map_err(|source| ConformError::Enumeration {
            server: server.clone(),
            source,
        })?;

    tracing::debug!(
        server = %server,
        host = %info.local_host,
        clients = listed.len(),
        "listed clients"
    );
    let clients = classify_clients(listed, &info, root_dir, kept);
    Ok(FleetScan { info, clients })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn info() -> BackendInfo {
        BackendInfo {
            local_host: "BUILD-01".to_string(),
            server_id: Some("edge-east".to_string()),
        }
    }

    fn client(name: &str, host: &str, server_id: Option<&str>, root: &str) -> RemoteClient {
        RemoteClient {
            name: name.to_string(),
            host: host.to_string(),
            server_id: server_id.map(str::to_string),
            root: root.to_string(),
        }
    }

    fn kept() -> KeptClients {
        KeptClients::from_names(["Conform+BUILD-01+Main"])
    }

    #[rstest]
    #[case::all_conditions_hold(client("Old", "build-01", None, "/agent/Old/Sync"), ClientVerdict::Orphan)]
    #[case::matching_server_id(client("Old", "BUILD-01", Some("EDGE-EAST"), "/agent/Old/Sync"), ClientVerdict::Orphan)]
    #[case::empty_server_id(client("Old", "BUILD-01", Some(""), "/agent/Old"), ClientVerdict::Orphan)]
    #[case::other_host(client("Old", "build-02", None, "/agent/Old/Sync"), ClientVerdict::ForeignHost)]
    #[case::other_edge(client("Old", "BUILD-01", Some("edge-west"), "/agent/Old/Sync"), ClientVerdict::ForeignServer)]
    #[case::root_outside(client("Old", "BUILD-01", None, "/home/dev/ws"), ClientVerdict::OutsideRoot)]
    #[case::root_is_agent_root(client("Old", "BUILD-01", None, "/agent"), ClientVerdict::OutsideRoot)]
    #[case::root_sibling_prefix(client("Old", "BUILD-01", None, "/agent2/Old"), ClientVerdict::OutsideRoot)]
    #[case::root_empty(client("Old", "BUILD-01", None, ""), ClientVerdict::UnparseableRoot)]
    #[case::root_relative(client("Old", "BUILD-01", None, "Old/Sync"), ClientVerdict::UnparseableRoot)]
    #[case::kept_name_any_case(client("conform+build-01+main", "BUILD-01", None, "/agent/Main/Sync"), ClientVerdict::Kept)]
    fn classify_each_condition(#[case] client: RemoteClient, #[case] expected: ClientVerdict) {
        let verdict = classify(&client, &info(), Path::new("/agent"), &kept());
        assert_eq!(verdict, expected);
    }

    #[test]
    fn unparseable_root_with_unknown_name_is_not_orphan() {
        let c = client("Mystery", "BUILD-01", None, "\0");
        assert_ne!(
            classify(&c, &info(), Path::new("/agent"), &KeptClients::default()),
            ClientVerdict::Orphan
        );
    }

    #[test]
    fn backend_without_server_id_only_accepts_empty_ids() {
        let info = BackendInfo {
            local_host: "BUILD-01".to_string(),
            server_id: None,
        };
        let with_id = client("Old", "BUILD-01", Some("edge-east"), "/agent/Old");
        let without_id = client("Old", "BUILD-01", None, "/agent/Old");
        let kept = KeptClients::default();
        assert_eq!(
            classify(&with_id, &info, Path::new("/agent"), &kept),
            ClientVerdict::ForeignServer
        );
        assert_eq!(
            classify(&without_id, &info, Path::new("/agent"), &kept),
            ClientVerdict::Orphan
        );
    }
}
