//! Spawns `p4` for one connection's server and user.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use conform_core::ConnectionSettings;

use crate::error::{spawn_err, P4Error};
use crate::records::{self, Record};

#[derive(Debug, Clone)]
pub struct Runner {
    program: PathBuf,
    settings: ConnectionSettings,
}

impl Runner {
    pub fn new(program: impl Into<PathBuf>, settings: ConnectionSettings) -> Self {
        Self {
            program: program.into(),
            settings,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Global options every invocation carries.
    pub fn global_args(&self, client: Option<&str>) -> Vec<String> {
        let mut args = vec![
            "-Mj".to_string(),
            "-ztag".to_string(),
            "-p".to_string(),
            self.settings.server_and_port.clone(),
            "-u".to_string(),
            self.settings.user_name.clone(),
        ];
        if let Some(client) = client {
            args.push("-c".to_string());
            args.push(client.to_string());
        }
        args
    }

    /// Run one command and return its data records.
    ///
    /// Error records and a non-zero exit both fail the call; warnings are
    /// logged at DEBUG and dropped.
    pub async fn run(
        &self,
        client: Option<&str>,
        args: &[&str],
        input: Option<&str>,
    ) -> Result<Vec<Record>, P4Error> {
        let label = args.join(" ");
        let mut command = Command::new(&self.program);
        command
            .args(self.global_args(client))
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(command = %label, client, server = %self.settings.server_and_port, "p4");
        let mut child = command.spawn().map_err(|e| spawn_err(&label, e))?;
        if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| spawn_err(&label, e))?;
            stdin.shutdown().await.map_err(|e| spawn_err(&label, e))?;
        }
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| spawn_err(&label, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let data = records::into_data(&label, records::parse_records(&label, &stdout)?)?;
        if !output.status.success() {
            return Err(P4Error::Exit {
                command: label,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(data)
    }
}
