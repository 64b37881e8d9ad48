//! The aggregate view produced by one refresh cycle.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;

use super::record::{round2, BackupRecord, SourceTag};

/// A source that contributed nothing this cycle, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFailure {
    pub source: SourceTag,
    pub reason: String,
}

/// Snapshot of every backup across all sources. Built once, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateView {
    pub records: Vec<BackupRecord>,
    pub total_count: usize,
    pub total_size_bytes: u64,
    pub total_size_megabytes: f64,
    pub per_source: BTreeMap<SourceTag, usize>,
    pub failures: Vec<SourceFailure>,
    pub refreshed_at: DateTime<Local>,
    most_recent: Option<BackupRecord>,
}

impl AggregateView {
    /// Sort `records` newest first (stable, so equal timestamps keep fetch
    /// order) and derive the totals. Every source in `configured` gets a
    /// per-source entry even when it produced nothing.
    pub fn build(
        mut records: Vec<BackupRecord>,
        configured: &[SourceTag],
        failures: Vec<SourceFailure>,
    ) -> Self {
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut per_source: BTreeMap<SourceTag, usize> =
            configured.iter().map(|tag| (*tag, 0)).collect();
        for record in &records {
            *per_source.entry(record.source_tag).or_insert(0) += 1;
        }

        let total_size_bytes = records.iter().map(|r| r.size_bytes).sum();
        let total_size_megabytes = round2(records.iter().map(|r| r.size_megabytes()).sum());

        Self {
            total_count: records.len(),
            most_recent: records.first().cloned(),
            records,
            total_size_bytes,
            total_size_megabytes,
            per_source,
            failures,
            refreshed_at: Local::now(),
        }
    }

    pub fn empty(configured: &[SourceTag]) -> Self {
        Self::build(Vec::new(), configured, Vec::new())
    }

    pub fn most_recent(&self) -> Option<&BackupRecord> {
        self.most_recent.as_ref()
    }

    pub fn count_for(&self, source: SourceTag) -> usize {
        self.per_source.get(&source).copied().unwrap_or(0)
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}
