//! Local backups: the host supervisor API, then the backup directory.
//!
//! Retrieval strategies are tried in order and the first one that answers
//! wins, even with an empty list. This source never returns an error.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::BackupSource;
use crate::fs::{scan_archives, ScanOptions};
use crate::model::{BackupRecord, SourceTag};
use crate::normalize::{normalize_all, normalize_archive, normalize_supervisor};
use crate::Result;

/// One way of listing local backups.
#[derive(Debug, Clone)]
pub enum LocalStrategy {
    /// `GET {base_url}/backups` on the supervisor.
    SupervisorApi {
        base_url: String,
        token: Option<String>,
    },
    /// Stat every archive in a directory.
    DirectoryScan { dir: PathBuf, options: ScanOptions },
}

impl LocalStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            LocalStrategy::SupervisorApi { .. } => "supervisor-api",
            LocalStrategy::DirectoryScan { .. } => "directory-scan",
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupervisorEnvelope {
    #[serde(default)]
    result: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<SupervisorData>,
}

#[derive(Debug, Deserialize)]
struct SupervisorData {
    #[serde(default)]
    backups: Vec<serde_json::Value>,
}

pub struct LocalSource {
    client: reqwest::Client,
    strategies: Vec<LocalStrategy>,
}

impl LocalSource {
    pub fn new(client: reqwest::Client, strategies: Vec<LocalStrategy>) -> Self {
        Self { client, strategies }
    }

    async fn attempt(&self, strategy: &LocalStrategy) -> Option<Vec<BackupRecord>> {
        match strategy {
            LocalStrategy::SupervisorApi { base_url, token } => {
                self.from_supervisor(base_url, token.as_deref()).await
            }
            LocalStrategy::DirectoryScan { dir, options } => {
                Self::from_directory(dir.clone(), options.clone()).await
            }
        }
    }

    async fn from_supervisor(&self, base_url: &str, token: Option<&str>) -> Option<Vec<BackupRecord>> {
        let url = format!("{}/backups", base_url.trim_end_matches('/'));
        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "Supervisor API unreachable");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "Supervisor API returned an error status");
            return None;
        }

        let envelope: SupervisorEnvelope = match response.json().await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(url = %url, error = %e, "Supervisor API returned an unreadable body");
                return None;
            }
        };

        if envelope.result != "ok" {
            warn!(
                result = %envelope.result,
                message = envelope.message.as_deref().unwrap_or(""),
                "Supervisor API rejected the backup listing"
            );
            return None;
        }

        let raws = envelope.data.map(|d| d.backups).unwrap_or_default();
        info!(count = raws.len(), "Retrieved backups from supervisor API");

        Some(normalize_all(SourceTag::Local, raws, |value| {
            normalize_supervisor(serde_json::from_value(value)?)
        }))
    }

    async fn from_directory(dir: PathBuf, options: ScanOptions) -> Option<Vec<BackupRecord>> {
        let dir_label = dir.display().to_string();
        let scanned = tokio::task::spawn_blocking(move || scan_archives(&dir, &options)).await;

        match scanned {
            Ok(Ok(archives)) => {
                info!(dir = %dir_label, count = archives.len(), "Scanned backup directory");
                Some(normalize_all(SourceTag::Local, archives, normalize_archive))
            }
            Ok(Err(e)) => {
                warn!(dir = %dir_label, error = %e, "Cannot read backup directory");
                None
            }
            Err(e) => {
                warn!(dir = %dir_label, error = %e, "Backup directory scan panicked");
                None
            }
        }
    }
}

#[async_trait]
impl BackupSource for LocalSource {
    fn tag(&self) -> SourceTag {
        SourceTag::Local
    }

    async fn fetch(&self) -> Result<Vec<BackupRecord>> {
        for strategy in &self.strategies {
            if let Some(records) = self.attempt(strategy).await {
                debug!(strategy = strategy.name(), count = records.len(), "Local retrieval succeeded");
                return Ok(records);
            }
            debug!(strategy = strategy.name(), "Local retrieval failed, trying next strategy");
        }

        warn!(
            strategies = self.strategies.len(),
            "No local retrieval strategy succeeded, reporting no local backups"
        );
        Ok(Vec::new())
    }
}
