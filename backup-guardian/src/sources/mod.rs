//! Backup source adapters.
//!
//! Each adapter queries exactly one origin and hands back normalized
//! records. Adapters share no state with each other.

pub mod drive;
pub mod local;

use async_trait::async_trait;
use std::sync::Arc;

use crate::model::{BackupRecord, SourceTag};
use crate::Result;

pub use drive::DriveSource;
pub use local::{LocalSource, LocalStrategy};

#[async_trait]
pub trait BackupSource: Send + Sync {
    fn tag(&self) -> SourceTag;

    /// List the backups this source currently holds.
    ///
    /// May return an empty list. The engine bounds every call with a
    /// timeout, so implementations need not add their own.
    async fn fetch(&self) -> Result<Vec<BackupRecord>>;
}

pub type SharedSource = Arc<dyn BackupSource>;
