pub mod fetcher;
pub mod rate_limit;
pub mod reconciler;
pub mod report;
pub mod retry;
pub mod sync;

pub use crate::domain::model::{DiffResult, Domain, DomainSet, SyncStats};
pub use crate::domain::ports::{BlockApi, Clock, DomainSource};
pub use crate::utils::error::Result;
