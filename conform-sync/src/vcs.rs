//! Backend collaborator seam and the per-pass connection pool.
//!
//! Every connection method takes `&mut self`, so a connection can never have
//! two calls in flight at once. The pool hands out one connection per
//! [`ConnectionKey`] and guarantees each registered connection is closed
//! exactly once by [`ConnectionPool::release_all`].

use async_trait::async_trait;

use conform_core::{
    BackendError, BackendInfo, ClientTemplate, ConnectionKey, ConnectionSettings, PopulatePlan,
    PopulateRequest, RemoteClient, SyncTarget, WorkspaceState,
};

/// Result of binding a client record for a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientBinding {
    /// `true` when no record existed and one was created.
    pub created: bool,
    /// The view the backend resolved for the client.
    pub stream_view: Vec<String>,
}

/// Opens authenticated connections to a backend.
#[async_trait]
pub trait VcsConnector: Send + Sync {
    async fn connect(
        &self,
        settings: &ConnectionSettings,
    ) -> Result<Box<dyn VcsConnection>, BackendError>;
}

/// One live connection to a backend server, as one user.
#[async_trait]
pub trait VcsConnection: Send {
    fn settings(&self) -> &ConnectionSettings;

    /// Identity of the calling host as the server sees it.
    async fn backend_info(&mut self) -> Result<BackendInfo, BackendError>;

    /// Every client record owned by `owner`.
    async fn list_clients(&mut self, owner: &str) -> Result<Vec<RemoteClient>, BackendError>;

    /// Reattach to the client named by the template, creating it if absent.
    /// Must not touch any other client record.
    async fn ensure_client(
        &mut self,
        template: &ClientTemplate,
    ) -> Result<ClientBinding, BackendError>;

    async fn delete_client(&mut self, name: &str) -> Result<(), BackendError>;

    /// Revert every pending change opened under `client`.
    async fn revert_all(&mut self, client: &str) -> Result<(), BackendError>;

    /// Plan a coordinated populate: one plan per request, in request order.
    async fn populate_clean(
        &mut self,
        requests: &[PopulateRequest],
    ) -> Result<Vec<PopulatePlan>, BackendError>;

    async fn populate_sync(
        &mut self,
        requests: &[PopulateRequest],
        plans: &[PopulatePlan],
        force_clean_first: bool,
    ) -> Result<(), BackendError>;

    /// Restore a single workspace's local files to its have-table.
    async fn simple_clean(&mut self, workspace: &WorkspaceState) -> Result<(), BackendError>;

    async fn simple_sync(
        &mut self,
        workspace: &WorkspaceState,
        target: SyncTarget,
        preflight_change: Option<u32>,
    ) -> Result<(), BackendError>;

    /// Release the connection. Called exactly once, by the pool.
    async fn close(&mut self) -> Result<(), BackendError>;
}

/// Connections opened during one pass, at most one per [`ConnectionKey`].
pub struct ConnectionPool<'c> {
    connector: &'c dyn VcsConnector,
    entries: Vec<(ConnectionKey, Box<dyn VcsConnection>)>,
}

impl<'c> ConnectionPool<'c> {
    pub fn new(connector: &'c dyn VcsConnector) -> Self {
        Self {
            connector,
            entries: Vec::new(),
        }
    }

    /// Return the pooled connection for `settings`, opening and registering
    /// it first if this is the first request for its key.
    pub async fn get_or_connect(
        &mut self,
        settings: &ConnectionSettings,
    ) -> Result<&mut dyn VcsConnection, BackendError> {
        let key = settings.key();
        let index = match self.entries.iter().position(|(k, _)| *k == key) {
            Some(index) => index,
            None => {
                let connection = self.connector.connect(settings).await?;
                tracing::debug!(connection = %settings, "opened backend connection");
                self.entries.push((key, connection));
                self.entries.len() - 1
            }
        };
        Ok(self.entries[index].1.as_mut())
    }

    /// Close every registered connection, emptying the pool.
    ///
    /// Close failures are logged and do not stop the remaining closes.
    /// Returns how many connections were closed cleanly.
    pub async fn release_all(&mut self) -> usize {
        let mut closed = 0;
        for (_, mut connection) in self.entries.drain(..) {
            match connection.close().await {
                Ok(()) => closed += 1,
                Err(err) => tracing::warn!(
                    connection = %connection.settings(),
                    error = %err,
                    "failed to close backend connection"
                ),
            }
        }
        closed
    }
}

impl Drop for ConnectionPool<'_> {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            tracing::warn!(
                count = self.entries.len(),
                "connection pool dropped without release; dropping connections"
            );
        }
    }
}
