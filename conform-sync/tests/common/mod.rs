//! Scripted in-memory backend shared by the integration tests.
//!
//! Every connector and connection call is appended to one ordered log, e.g.
//! `connect build@perforce:1666`, `ensure Conform+BUILD-01+Main`,
//! `simple_sync Conform+BUILD-01+Main`, so tests can assert phase ordering.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use conform_core::{
    BackendError, BackendInfo, ClientTemplate, ConnectionSettings, PopulatePlan, PopulateRequest,
    RemoteClient, StreamSnapshot, SyncMethod, SyncTarget, WorkspaceSpec, WorkspaceState,
};
use conform_sync::{ClientBinding, VcsConnection, VcsConnector};

pub const HOST: &str = "build-01";
pub const SERVER: &str = "perforce:1666";
pub const USER: &str = "build";

#[derive(Debug, Clone)]
struct StoredClient {
    server: String,
    owner: String,
    client: RemoteClient,
}

#[derive(Default)]
struct State {
    host: String,
    server_id: Option<String>,
    clients: Vec<StoredClient>,
    calls: Vec<String>,
    routes: Vec<String>,
    fail_on: Vec<String>,
    cancel_on: Option<(String, CancellationToken)>,
    short_plans: bool,
    connects: usize,
    closes: usize,
}

#[derive(Clone)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new(HOST, None)
    }
}

impl FakeBackend {
    pub fn new(host: &str, server_id: Option<&str>) -> Self {
        let state = State {
            host: host.to_string(),
            server_id: server_id.map(str::to_string),
            ..State::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake backend lock")
    }

    /// Seed a client record owned by [`USER`] on [`SERVER`].
    pub fn with_client(self, name: &str, host: &str, server_id: Option<&str>, root: &str) -> Self {
        self.lock().clients.push(StoredClient {
            server: SERVER.to_string(),
            owner: USER.to_string(),
            client: RemoteClient {
                name: name.to_string(),
                host: host.to_string(),
                server_id: server_id.map(str::to_string),
                root: root.to_string(),
            },
        });
        self
    }

    /// Fail every call whose log line starts with `prefix`.
    pub fn fail_on(self, prefix: &str) -> Self {
        self.lock().fail_on.push(prefix.to_string());
        self
    }

    /// Cancel `token` while serving the first call starting with `prefix`.
    pub fn cancel_on(self, prefix: &str, token: CancellationToken) -> Self {
        self.lock().cancel_on = Some((prefix.to_string(), token));
        self
    }

    /// Make `populate_clean` return one plan fewer than requested.
    pub fn short_plans(self) -> Self {
        self.lock().short_plans = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Per-request populate calls as `{op} {client} on {server}`.
    pub fn routes(&self) -> Vec<String> {
        self.lock().routes.clone()
    }

    pub fn client_names(&self) -> Vec<String> {
        self.lock()
            .clients
            .iter()
            .map(|c| c.client.name.clone())
            .collect()
    }

    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    pub fn closes(&self) -> usize {
        self.lock().closes
    }

    /// Log position of the first call starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.lock().calls.iter().position(|c| c.starts_with(prefix))
    }

    /// Log position of the last call starting with `prefix`.
    pub fn last_position(&self, prefix: &str) -> Option<usize> {
        self.lock().calls.iter().rposition(|c| c.starts_with(prefix))
    }

    fn record(&self, call: String) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.calls.push(call.clone());
        if let Some((prefix, token)) = &state.cancel_on {
            if call.starts_with(prefix.as_str()) {
                token.cancel();
            }
        }
        if state.fail_on.iter().any(|p| call.starts_with(p.as_str())) {
            return Err(BackendError::new(format!("injected failure: {call}")));
        }
        Ok(())
    }

    fn route(&self, op: &str, requests: &[PopulateRequest], settings: &ConnectionSettings) {
        let mut state = self.lock();
        for request in requests {
            state.routes.push(format!(
                "{op} {} on {}",
                request.client_name, settings.server_and_port
            ));
        }
    }
}

#[async_trait]
impl VcsConnector for FakeBackend {
    async fn connect(
        &self,
        settings: &ConnectionSettings,
    ) -> Result<Box<dyn VcsConnection>, BackendError> {
        self.record(format!("connect {settings}"))?;
        self.lock().connects += 1;
        Ok(Box::new(FakeConnection {
            backend: self.clone(),
            settings: settings.clone(),
        }))
    }
}

struct FakeConnection {
    backend: FakeBackend,
    settings: ConnectionSettings,
}

fn names(requests: &[PopulateRequest]) -> String {
    requests
        .iter()
        .map(|r| r.client_name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl VcsConnection for FakeConnection {
    fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    async fn backend_info(&mut self) -> Result<BackendInfo, BackendError> {
        self.backend.record("info".to_string())?;
        let state = self.backend.lock();
        Ok(BackendInfo {
            local_host: state.host.clone(),
            server_id: state.server_id.clone(),
        })
    }

    async fn list_clients(&mut self, owner: &str) -> Result<Vec<RemoteClient>, BackendError> {
        self.backend.record(format!("clients {owner}"))?;
        let server = self.settings.server_and_port.to_lowercase();
        Ok(self
            .backend
            .lock()
            .clients
            .iter()
            .filter(|c| c.server.to_lowercase() == server && c.owner == owner)
            .map(|c| c.client.clone())
            .collect())
    }

    async fn ensure_client(
        &mut self,
        template: &ClientTemplate,
    ) -> Result<ClientBinding, BackendError> {
        self.backend.record(format!("ensure {}", template.name))?;
        let server = self.settings.server_and_port.to_lowercase();
        let mut state = self.backend.lock();
        let exists = state.clients.iter().any(|c| {
            c.server.to_lowercase() == server && c.client.name.eq_ignore_ascii_case(&template.name)
        });
        if !exists {
            state.clients.push(StoredClient {
                server: self.settings.server_and_port.clone(),
                owner: template.owner.clone(),
                client: RemoteClient {
                    name: template.name.clone(),
                    host: template.host.clone(),
                    server_id: None,
                    root: template.root.display().to_string(),
                },
            });
        }
        Ok(ClientBinding {
            created: !exists,
            stream_view: template.view.clone(),
        })
    }

    async fn delete_client(&mut self, name: &str) -> Result<(), BackendError> {
        self.backend.record(format!("delete {name}"))?;
        self.backend
            .lock()
            .clients
            .retain(|c| !c.client.name.eq_ignore_ascii_case(name));
        Ok(())
    }

    async fn revert_all(&mut self, client: &str) -> Result<(), BackendError> {
        self.backend.record(format!("revert {client}"))
    }

    async fn populate_clean(
        &mut self,
        requests: &[PopulateRequest],
    ) -> Result<Vec<PopulatePlan>, BackendError> {
        self.backend.record(format!("populate_clean {}", names(requests)))?;
        self.backend.route("populate_clean", requests, &self.settings);
        let short = self.backend.lock().short_plans;
        let count = if short {
            requests.len().saturating_sub(1)
        } else {
            requests.len()
        };
        Ok(requests
            .iter()
            .take(count)
            .map(|r| PopulatePlan {
                base_change: 100,
                snapshot: StreamSnapshot {
                    stream: r.stream.clone(),
                    change: 120,
                    digest: None,
                },
            })
            .collect())
    }

    async fn populate_sync(
        &mut self,
        requests: &[PopulateRequest],
        plans: &[PopulatePlan],
        force_clean_first: bool,
    ) -> Result<(), BackendError> {
        assert_eq!(requests.len(), plans.len());
        self.backend.record(format!(
            "populate_sync {} force={force_clean_first}",
            names(requests)
        ))?;
        self.backend.route("populate_sync", requests, &self.settings);
        Ok(())
    }

    async fn simple_clean(&mut self, workspace: &WorkspaceState) -> Result<(), BackendError> {
        self.backend
            .record(format!("simple_clean {}", workspace.client_name))
    }

    async fn simple_sync(
        &mut self,
        workspace: &WorkspaceState,
        target: SyncTarget,
        preflight_change: Option<u32>,
    ) -> Result<(), BackendError> {
        assert_eq!(target, SyncTarget::Latest);
        assert_eq!(preflight_change, None);
        self.backend
            .record(format!("simple_sync {}", workspace.client_name))
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.backend.lock().closes += 1;
        self.backend.record(format!("close {}", self.settings))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn spec(identifier: &str, method: SyncMethod) -> WorkspaceSpec {
    WorkspaceSpec {
        identifier: identifier.to_string(),
        stream: format!("//UE5/{identifier}"),
        method,
        remove_untracked_files: false,
        view: vec![],
        server_and_port: SERVER.to_string(),
        user_name: USER.to_string(),
        incremental: false,
    }
}

pub fn tracked(identifier: &str) -> WorkspaceSpec {
    spec(identifier, SyncMethod::Tracked)
}

/// Client name a pass on [`HOST`] uses for a tracked workspace.
pub fn client(identifier: &str) -> String {
    format!("Conform+BUILD-01+{identifier}")
}

pub fn root_of(root: &Path, identifier: &str) -> String {
    root.join(identifier).join("Sync").display().to_string()
}

pub fn sync_dir(root: &Path, identifier: &str) -> PathBuf {
    root.join(identifier).join("Sync")
}
