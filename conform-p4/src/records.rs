//! Tagged output records.
//!
//! With `-Mj -ztag` the server prints one JSON object per line. Data records
//! carry the command's tagged fields; message records carry `generic`,
//! `severity` and `data`. Severity 3 and up is an error, anything lower is an
//! informational or warning message (e.g. "file(s) up-to-date").

use serde_json::{Map, Value};

use crate::error::P4Error;

const SEVERITY_FAILED: u64 = 3;

/// One tagged output record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn require(&self, command: &str, field: &'static str) -> Result<&str, P4Error> {
        self.get(field).ok_or_else(|| P4Error::MissingField {
            command: command.to_string(),
            field,
        })
    }

    fn severity(&self) -> Option<u64> {
        self.fields.get("severity").and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
    }

    /// A message record, not a data record.
    pub fn is_message(&self) -> bool {
        self.severity().is_some()
    }

    pub fn is_error(&self) -> bool {
        self.severity().is_some_and(|s| s >= SEVERITY_FAILED)
    }

    pub fn message(&self) -> &str {
        self.get("data").map(str::trim_end).unwrap_or("")
    }
}

/// Parse every non-blank line of `stdout` as a record.
pub fn parse_records(command: &str, stdout: &str) -> Result<Vec<Record>, P4Error> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str::<Map<String, Value>>(line)
                .map(|fields| Record { fields })
                .map_err(|source| P4Error::Output {
                    command: command.to_string(),
                    source,
                })
        })
        .collect()
}

/// Fail on the first error record; drop message records otherwise.
pub fn into_data(command: &str, records: Vec<Record>) -> Result<Vec<Record>, P4Error> {
    if let Some(err) = records.iter().find(|r| r.is_error()) {
        return Err(P4Error::Command {
            command: command.to_string(),
            message: err.message().to_string(),
        });
    }
    for warning in records.iter().filter(|r| r.is_message()) {
        tracing::debug!(command, message = warning.message(), "p4 message");
    }
    Ok(records.into_iter().filter(|r| !r.is_message()).collect())
}
