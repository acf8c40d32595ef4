//! Conform core library: domain types, manifest persistence, errors and
//! the filesystem force-delete primitives.
//!
//! - [`types`]: workspace specs, materialized state, remote client records
//! - [`error`]: [`ConformError`], [`BackendError`], [`ManifestError`]
//! - [`manifest`]: load / save the desired-workspace YAML manifest
//! - [`paths`]: lexical path normalization and containment checks
//! - [`fs_guard`]: force-delete files and directories, read-only tolerant

pub mod error;
pub mod fs_guard;
pub mod manifest;
pub mod paths;
pub mod types;

pub use error::{BackendError, ConformError, ManifestError, SyncPhase};
pub use types::{
    BackendInfo, ClientRoot, ClientTemplate, ConnectionKey, ConnectionSettings, Housekeeping,
    Manifest, PopulatePlan, PopulateRequest, RemoteClient, StreamSnapshot, SyncMethod,
    SyncTarget, WorkspaceSpec, WorkspaceState,
};
