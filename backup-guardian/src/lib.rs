//! Backup Guardian Library
//!
//! Aggregates backup metadata from the local host and Google Drive into one
//! periodically refreshed view.

pub mod api;
pub mod config;
pub mod daemon;
pub mod engine;
pub mod fs;
pub mod guardian;
pub mod model;
pub mod normalize;
pub mod poller;
pub mod sources;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::Config;
pub use guardian::Guardian;
pub use model::{AggregateView, BackupRecord, SourceTag};
pub use utils::errors::{GuardianError, Result};
