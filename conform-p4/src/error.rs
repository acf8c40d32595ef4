use std::process::ExitStatus;

use thiserror::Error;

use conform_core::BackendError;

/// Error surface for the `p4` command-line backend.
#[derive(Debug, Error)]
pub enum P4Error {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed: {message}")]
    Command { command: String, message: String },

    #[error("`{command}` exited with {status}: {stderr}")]
    Exit {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("unreadable output from `{command}`: {source}")]
    Output {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("`{command}` returned no `{field}` field")]
    MissingField { command: String, field: &'static str },
}

pub(crate) fn spawn_err(command: impl Into<String>, source: std::io::Error) -> P4Error {
    P4Error::Spawn {
        command: command.into(),
        source,
    }
}

impl From<P4Error> for BackendError {
    fn from(err: P4Error) -> Self {
        BackendError::with_source(err.to_string(), err)
    }
}
