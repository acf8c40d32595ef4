//! # conform-sync
//!
//! The conform pass: materialize desired workspaces, delete orphaned clients
//! and stray directories, revert open changes, then plan and sync every
//! group of workspaces.
//!
//! Call [`Reconciler::conform`] for a single pass over a workspace list, or
//! [`pipeline::run`] to drive a pass (plus housekeeping) from a [`Manifest`].
//! The backend is reached only through the [`VcsConnector`] /
//! [`VcsConnection`] traits.
//!
//! [`Manifest`]: conform_core::Manifest

pub mod cleanup;
pub mod context;
pub mod error;
pub mod grouper;
pub mod housekeeping;
pub mod materializer;
pub mod pipeline;
pub mod plan;
pub mod reconciler;
pub mod scanner;
pub mod vcs;

pub use cleanup::{ProtectedPathSet, StrayCleanup};
pub use context::ConformContext;
pub use error::PipelineError;
pub use grouper::{SyncGroup, SyncStrategy};
pub use housekeeping::HousekeepingOutcome;
pub use plan::{plan_pass, PassPlan};
pub use reconciler::{ConformReport, GroupReport, Reconciler};
pub use scanner::{ClassifiedClient, ClientVerdict, FleetScan, KeptClients};
pub use vcs::{ClientBinding, ConnectionPool, VcsConnection, VcsConnector};
