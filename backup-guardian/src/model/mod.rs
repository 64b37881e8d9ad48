//! Data model: normalized records and the per-cycle aggregate view.

pub mod record;
pub mod view;

pub use record::{BackupRecord, SourceTag};
pub use view::{AggregateView, SourceFailure};
