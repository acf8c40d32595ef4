//! Domain types for workspace conformance.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for local
//! filesystem paths. The one exception is [`RemoteClient::root`], which holds
//! whatever the backend reported and is only turned into a path through
//! [`ClientRoot::parse`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::paths;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a workspace records which file revisions are present locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncMethod {
    /// The backend keeps a have-table for the client; incremental sync is possible.
    #[default]
    Tracked,
    /// No have-table; content is populated from snapshots.
    Untracked,
}

impl SyncMethod {
    pub fn uses_have_table(self) -> bool {
        matches!(self, SyncMethod::Tracked)
    }
}

impl fmt::Display for SyncMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMethod::Tracked => write!(f, "tracked"),
            SyncMethod::Untracked => write!(f, "untracked"),
        }
    }
}

/// Revision a simple sync should bring a workspace to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTarget {
    Latest,
    Change(u32),
}

impl fmt::Display for SyncTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncTarget::Latest => write!(f, "#head"),
            SyncTarget::Change(n) => write!(f, "@{n}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Desired state
// ---------------------------------------------------------------------------

/// One desired workspace, as assigned to this agent by the job scheduler.
///
/// Read-only for the whole pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSpec {
    pub identifier: String,
    pub stream: String,
    #[serde(default)]
    pub method: SyncMethod,
    #[serde(default)]
    pub remove_untracked_files: bool,
    #[serde(default)]
    pub view: Vec<String>,
    pub server_and_port: String,
    pub user_name: String,
    #[serde(default)]
    pub incremental: bool,
}

impl WorkspaceSpec {
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings::new(&self.server_and_port, &self.user_name)
    }
}

/// Best-effort cleanup applied after a successful pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Housekeeping {
    /// Subdirectories of each metadata directory to delete outright.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata_subdirs: Vec<String>,
    /// Workspace-relative directories whose contents are emptied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workspace_content_dirs: Vec<String>,
}

impl Housekeeping {
    pub fn is_empty(&self) -> bool {
        self.metadata_subdirs.is_empty() && self.workspace_content_dirs.is_empty()
    }
}

/// Root of the desired-workspace YAML manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Absolute agent root directory every workspace lives under.
    pub root_dir: PathBuf,
    #[serde(default)]
    pub remove_untracked_files: bool,
    #[serde(default)]
    pub workspaces: Vec<WorkspaceSpec>,
    #[serde(default, skip_serializing_if = "Housekeeping::is_empty")]
    pub housekeeping: Housekeeping,
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// Where and as whom to connect to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub server_and_port: String,
    pub user_name: String,
}

impl ConnectionSettings {
    pub fn new(server_and_port: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            server_and_port: server_and_port.into(),
            user_name: user_name.into(),
        }
    }

    /// Deduplication key: server compared case-insensitively, user exactly.
    pub fn key(&self) -> ConnectionKey {
        ConnectionKey {
            server: self.server_and_port.to_lowercase(),
            user: self.user_name.clone(),
        }
    }
}

impl fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user_name, self.server_and_port)
    }
}

/// Identity of one pooled connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionKey {
    server: String,
    user: String,
}

/// Identity the backend reports for the calling agent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BackendInfo {
    pub local_host: String,
    pub server_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Materialized state
// ---------------------------------------------------------------------------

/// A desired workspace bound to a live client record and to paths under the
/// agent root. Created fresh on every pass, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceState {
    pub identifier: String,
    pub client_name: String,
    pub server_and_port: String,
    pub user_name: String,
    /// Always a strict descendant of the agent root.
    pub workspace_dir: PathBuf,
    /// Cache directory; workspaces sharing one are synced together.
    pub metadata_dir: PathBuf,
    pub stream: String,
    pub stream_view: Vec<String>,
    pub remove_untracked_files: bool,
    pub use_have_table: bool,
}

impl WorkspaceState {
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings::new(&self.server_and_port, &self.user_name)
    }

    pub fn populate_request(&self) -> PopulateRequest {
        PopulateRequest {
            client_name: self.client_name.clone(),
            stream: self.stream.clone(),
            view: self.stream_view.clone(),
        }
    }
}

/// Client record the materializer asks the backend to create or reattach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientTemplate {
    pub name: String,
    pub owner: String,
    pub host: String,
    pub root: PathBuf,
    pub stream: String,
    pub view: Vec<String>,
    pub use_have_table: bool,
}

// ---------------------------------------------------------------------------
// Fleet scanning
// ---------------------------------------------------------------------------

/// A client record as listed by the backend. Scratch data for one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteClient {
    pub name: String,
    pub host: String,
    pub server_id: Option<String>,
    /// Root exactly as reported; may be malformed.
    pub root: String,
}

/// Parse result of a reported client root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRoot {
    Valid(PathBuf),
    Unparseable,
}

impl ClientRoot {
    /// Valid iff non-empty, free of NUL bytes, absolute, and normalizable
    /// without climbing above the filesystem root.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.contains('\0') {
            return ClientRoot::Unparseable;
        }
        match paths::normalize(Path::new(raw)) {
            Some(path) => ClientRoot::Valid(path),
            None => ClientRoot::Unparseable,
        }
    }
}

// ---------------------------------------------------------------------------
// Sync collaborator payloads
// ---------------------------------------------------------------------------

/// One member of a populate group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulateRequest {
    pub client_name: String,
    pub stream: String,
    pub view: Vec<String>,
}

/// Content snapshot captured while planning a populate. Opaque to the
/// reconciler; only the backend interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSnapshot {
    pub stream: String,
    pub change: u32,
    pub digest: Option<String>,
}

/// Per-member result of the populate planning step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulatePlan {
    pub base_change: u32,
    pub snapshot: StreamSnapshot,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
