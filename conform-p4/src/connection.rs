//! [`VcsConnector`] / [`VcsConnection`] over the `p4` command-line client.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;

use conform_core::{
    BackendError, BackendInfo, ClientTemplate, ConnectionSettings, PopulatePlan, PopulateRequest,
    RemoteClient, StreamSnapshot, SyncTarget, WorkspaceState,
};
use conform_sync::{ClientBinding, VcsConnection, VcsConnector};

use crate::error::P4Error;
use crate::form;
use crate::records::Record;
use crate::runner::Runner;

const DEFAULT_PROGRAM: &str = "p4";

/// Opens [`P4Connection`]s, checking the user has a valid ticket first.
#[derive(Debug, Clone)]
pub struct P4Connector {
    program: PathBuf,
}

impl Default for P4Connector {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl P4Connector {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl VcsConnector for P4Connector {
    async fn connect(
        &self,
        settings: &ConnectionSettings,
    ) -> Result<Box<dyn VcsConnection>, BackendError> {
        let runner = Runner::new(&self.program, settings.clone());
        runner.run(None, &["login", "-s"], None).await?;
        tracing::debug!(connection = %settings, program = %runner.program().display(), "p4 ticket valid");
        Ok(Box::new(P4Connection {
            runner,
            have_tables: HashMap::new(),
            streams: HashMap::new(),
        }))
    }
}

/// One server and user. Remembers which clients it bound without a
/// have-table so syncs use `-p` for them, and which stream each client is
/// currently switched to.
pub struct P4Connection {
    runner: Runner,
    have_tables: HashMap<String, bool>,
    streams: HashMap<String, String>,
}

impl P4Connection {
    fn uses_have_table(&self, client: &str) -> bool {
        self.have_tables
            .get(&client.to_lowercase())
            .copied()
            .unwrap_or(true)
    }

    /// Point `client` at `stream` unless it is already known to be there.
    ///
    /// Several workspaces may share one client name while naming different
    /// streams, so every clean and sync switches first.
    async fn switch_stream(&mut self, client: &str, stream: &str) -> Result<(), P4Error> {
        let key = client.to_lowercase();
        if self.streams.get(&key).is_some_and(|current| current == stream) {
            return Ok(());
        }
        self.runner
            .run(Some(client), &["client", "-s", "-S", stream], None)
            .await?;
        tracing::debug!(client, stream, "switched client stream");
        self.streams.insert(key, stream.to_string());
        Ok(())
    }

    async fn client_form(&self, name: &str) -> Result<Option<Record>, P4Error> {
        let records = self.runner.run(None, &["client", "-o", name], None).await?;
        // `client -o` describes a default form for unknown names; only saved
        // clients carry an access time.
        Ok(records.into_iter().find(|r| r.get("Access").is_some()))
    }

    async fn latest_change(&self, stream: &str) -> Result<u32, P4Error> {
        let command = "changes -m1 -s submitted";
        let path = format!("{stream}/...");
        let records = self
            .runner
            .run(None, &["changes", "-m1", "-s", "submitted", path.as_str()], None)
            .await?;
        let Some(record) = records.first() else {
            return Ok(0);
        };
        let change = record.require(command, "change")?;
        change.parse().map_err(|_| P4Error::Command {
            command: command.to_string(),
            message: format!("invalid change number '{change}'"),
        })
    }

    async fn sync_client(
        &self,
        client: &str,
        filters: &[String],
        revision: &str,
        force: bool,
    ) -> Result<(), P4Error> {
        let mut args = vec!["sync".to_string(), "-q".to_string()];
        if !self.uses_have_table(client) {
            args.push("-p".to_string());
        }
        if force {
            args.push("-f".to_string());
        }
        args.extend(form::file_args(client, filters, Some(revision)));
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner.run(Some(client), &args, None).await?;
        Ok(())
    }
}

#[async_trait]
impl VcsConnection for P4Connection {
    fn settings(&self) -> &ConnectionSettings {
        self.runner.settings()
    }

    async fn backend_info(&mut self) -> Result<BackendInfo, BackendError> {
        let records = self.runner.run(None, &["info"], None).await?;
        let record = records.first().ok_or(P4Error::MissingField {
            command: "info".to_string(),
            field: "clientHost",
        })?;
        Ok(BackendInfo {
            local_host: record.require("info", "clientHost")?.to_string(),
            server_id: record
                .get("serverID")
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        })
    }

    async fn list_clients(&mut self, owner: &str) -> Result<Vec<RemoteClient>, BackendError> {
        let records = self.runner.run(None, &["clients", "-u", owner], None).await?;
        records
            .iter()
            .map(|r| {
                Ok(RemoteClient {
                    name: r.require("clients", "client")?.to_string(),
                    host: r.get("Host").unwrap_or("").to_string(),
                    server_id: r.get("ServerID").map(str::to_string),
                    root: r.get("Root").unwrap_or("").to_string(),
                })
            })
            .collect::<Result<Vec<_>, P4Error>>()
            .map_err(BackendError::from)
    }

    async fn ensure_client(
        &mut self,
        template: &ClientTemplate,
    ) -> Result<ClientBinding, BackendError> {
        self.have_tables
            .insert(template.name.to_lowercase(), template.use_have_table);
        self.streams
            .insert(template.name.to_lowercase(), template.stream.clone());

        let existing = self.client_form(&template.name).await?;
        let created = existing.is_none();
        let up_to_date = existing.as_ref().is_some_and(|r| {
            r.get("Root") == Some(&*template.root.display().to_string())
                && r.get("Stream") == Some(template.stream.as_str())
                && r.get("Host").is_some_and(|h| h.eq_ignore_ascii_case(&template.host))
        });

        if !up_to_date {
            let spec = form::client_spec(template);
            self.runner.run(None, &["client", "-i"], Some(&spec)).await?;
            if !created {
                tracing::info!(client = %template.name, "updated client spec");
            }
            if self.client_form(&template.name).await?.is_none() {
                return Err(P4Error::Command {
                    command: "client -i".to_string(),
                    message: format!("client {} was not saved", template.name),
                }
                .into());
            }
        }

        // The stream supplies the mappings; the workspace view is the filter
        // list applied on top of it at clean and sync time.
        Ok(ClientBinding {
            created,
            stream_view: template.view.clone(),
        })
    }

    async fn delete_client(&mut self, name: &str) -> Result<(), BackendError> {
        self.runner.run(None, &["client", "-d", name], None).await?;
        self.have_tables.remove(&name.to_lowercase());
        self.streams.remove(&name.to_lowercase());
        Ok(())
    }

    async fn revert_all(&mut self, client: &str) -> Result<(), BackendError> {
        let path = format!("//{client}/...");
        self.runner
            .run(Some(client), &["revert", "-k", path.as_str()], None)
            .await?;
        Ok(())
    }

    async fn populate_clean(
        &mut self,
        requests: &[PopulateRequest],
    ) -> Result<Vec<PopulatePlan>, BackendError> {
        let mut plans = Vec::with_capacity(requests.len());
        for request in requests {
            self.switch_stream(&request.client_name, &request.stream)
                .await?;
            if self.uses_have_table(&request.client_name) {
                let mut args = vec!["clean".to_string()];
                args.extend(form::file_args(&request.client_name, &request.view, None));
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                self.runner
                    .run(Some(request.client_name.as_str()), &args, None).await?;
            }
            let change = self.latest_change(&request.stream).await?;
            tracing::debug!(client = %request.client_name, stream = %request.stream, change, "planned populate");
            plans.push(PopulatePlan {
                base_change: change,
                snapshot: StreamSnapshot {
                    stream: request.stream.clone(),
                    change,
                    digest: None,
                },
            });
        }
        Ok(plans)
    }

    async fn populate_sync(
        &mut self,
        requests: &[PopulateRequest],
        plans: &[PopulatePlan],
        force_clean_first: bool,
    ) -> Result<(), BackendError> {
        for (request, plan) in requests.iter().zip(plans) {
            self.switch_stream(&request.client_name, &request.stream)
                .await?;
            let revision = form::revision(SyncTarget::Change(plan.snapshot.change));
            self.sync_client(&request.client_name, &request.view, &revision, force_clean_first)
                .await?;
        }
        Ok(())
    }

    async fn simple_clean(&mut self, workspace: &WorkspaceState) -> Result<(), BackendError> {
        self.switch_stream(&workspace.client_name, &workspace.stream)
            .await?;
        let mut args = vec!["clean".to_string(), "-e".to_string(), "-d".to_string()];
        args.extend(form::file_args(
            &workspace.client_name,
            &workspace.stream_view,
            None,
        ));
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner
            .run(Some(workspace.client_name.as_str()), &args, None)
            .await?;
        Ok(())
    }

    async fn simple_sync(
        &mut self,
        workspace: &WorkspaceState,
        target: SyncTarget,
        preflight_change: Option<u32>,
    ) -> Result<(), BackendError> {
        let client = workspace.client_name.as_str();
        self.switch_stream(client, &workspace.stream).await?;
        self.sync_client(client, &workspace.stream_view, &form::revision(target), false)
            .await?;

        if let Some(change) = preflight_change {
            let shelf = change.to_string();
            let path = format!("//{client}/...");
            self.runner
                .run(Some(client), &["unshelve", "-s", shelf.as_str(), "-f", path.as_str()], None)
                .await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        tracing::debug!(connection = %self.runner.settings(), "closing p4 connection");
        self.have_tables.clear();
        self.streams.clear();
        Ok(())
    }
}
