//! Aggregation engine.
//!
//! Runs every source concurrently, each on its own task and under its own
//! timeout, then merges whatever came back into one [`AggregateView`]. A
//! source that errors, times out or panics contributes nothing and is listed
//! in the view's failures; the cycle itself still succeeds.

use async_trait::async_trait;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::model::{AggregateView, BackupRecord, SourceFailure, SourceTag};
use crate::sources::SharedSource;
use crate::utils::{GuardianError, Result};

pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can produce a fresh view. The poller drives one of these.
#[async_trait]
pub trait Refresh: Send + Sync {
    /// Build a new view. An error means the cycle as a whole broke, not
    /// that a source failed.
    async fn refresh(&self) -> Result<AggregateView>;

    fn configured_sources(&self) -> Vec<SourceTag>;
}

pub struct Aggregator {
    sources: Vec<SharedSource>,
    source_timeout: Duration,
}

impl Aggregator {
    pub fn new(sources: Vec<SharedSource>, source_timeout: Duration) -> Self {
        Self {
            sources,
            source_timeout,
        }
    }
}

#[async_trait]
impl Refresh for Aggregator {
    async fn refresh(&self) -> Result<AggregateView> {
        let timeout = self.source_timeout;
        // Dropping the set aborts every fetch still running.
        let mut tasks = JoinSet::new();

        for (index, source) in self.sources.iter().cloned().enumerate() {
            tasks.spawn(async move {
                let fetch = AssertUnwindSafe(source.fetch()).catch_unwind();
                let outcome = match tokio::time::timeout(timeout, fetch).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => Err(GuardianError::SourceUnavailable("source task panicked".into())),
                    Err(_) => Err(GuardianError::Timeout(timeout)),
                };
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<Result<Vec<BackupRecord>>>> =
            self.sources.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) =
                joined.map_err(|e| GuardianError::Cycle(format!("source task lost: {e}")))?;
            outcomes[index] = Some(outcome);
        }

        let mut merged = Vec::new();
        let mut failures = Vec::new();
        for (source, outcome) in self.sources.iter().zip(outcomes) {
            let tag = source.tag();
            match outcome {
                Some(Ok(records)) => {
                    info!(source = %tag, count = records.len(), "Fetched backups");
                    merged.extend(records);
                }
                Some(Err(e)) => {
                    warn!(source = %tag, error = %e, "Backup source failed, skipping it this cycle");
                    failures.push(SourceFailure {
                        source: tag,
                        reason: e.to_string(),
                    });
                }
                None => {
                    return Err(GuardianError::Cycle(format!("no result from source {tag}")));
                }
            }
        }

        let view = AggregateView::build(merged, &self.configured_sources(), failures);
        info!(
            total = view.total_count,
            total_mb = view.total_size_megabytes,
            failed_sources = view.failures.len(),
            "Aggregated backups"
        );
        Ok(view)
    }

    fn configured_sources(&self) -> Vec<SourceTag> {
        self.sources.iter().map(|s| s.tag()).collect()
    }
}
