//! Perforce backend: drives the `p4` command-line client with tagged JSON
//! output and exposes it through the conform-sync connection traits.

mod connection;
mod error;
pub mod form;
pub mod records;
mod runner;

pub use connection::{P4Connection, P4Connector};
pub use error::P4Error;
pub use runner::Runner;
