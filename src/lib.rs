pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{CliArgs, SourceKind, SyncConfig};
pub use crate::core::report::{Reporter, SyncSummary};
pub use crate::core::sync::{SyncEngine, SyncOutcome};
pub use utils::error::{Result, SyncError};
