//! Guardian lifecycle.
//!
//! One `Guardian` per running instance. It owns the configured sources, the
//! engine and the poller, and everything it spawns stops on `teardown`.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{CloudConfig, Config, LocalConfig};
use crate::engine::{Aggregator, Refresh};
use crate::fs::ScanOptions;
use crate::poller::{CycleOutcome, Poller, PollerState, SharedView};
use crate::sources::drive::folder::FolderId;
use crate::sources::drive::{DEFAULT_API_BASE, DEFAULT_TOKEN_URL};
use crate::sources::drive::oauth::{self, ClientCredentials, TokenBundle};
use crate::sources::{DriveSource, LocalSource, LocalStrategy, SharedSource};
use crate::utils::{GuardianError, Result};

const HTTP_TIMEOUT: Duration = Duration::from_secs(20);
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Guardian {
    poller: Arc<Poller>,
    drive: Option<Arc<DriveSource>>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Guardian {
    /// Validate `config`, build the sources and start polling.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn setup(config: &Config) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("backup-guardian/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut sources: Vec<SharedSource> = Vec::new();
        if config.local.enabled {
            sources.push(Arc::new(build_local(&config.local, client.clone())));
        }

        let drive = if config.cloud.enabled {
            let drive = Arc::new(build_drive(&config.cloud, client)?);
            sources.push(drive.clone());
            Some(drive)
        } else {
            None
        };

        // Subscribe before the first cycle can refresh anything.
        let token_updates = drive
            .as_ref()
            .zip(config.cloud.token_cache.clone())
            .map(|(drive, path)| (drive.subscribe_tokens(), path));

        let engine = Arc::new(Aggregator::new(sources, config.poller.source_timeout()));
        let mut guardian = Self::start(engine, config.poller.interval(), drive);

        if let Some((updates, path)) = token_updates {
            let handle = spawn_token_persistence(updates, path, guardian.cancel.clone());
            guardian.tasks.get_mut().push(handle);
        }

        info!(
            sources = ?guardian.poller.configured_sources(),
            interval_secs = config.poller.interval_secs,
            "Backup guardian set up"
        );
        Ok(guardian)
    }

    /// Start polling an arbitrary engine.
    pub fn with_engine(engine: Arc<dyn Refresh>, interval: Duration) -> Self {
        Self::start(engine, interval, None)
    }

    fn start(engine: Arc<dyn Refresh>, interval: Duration, drive: Option<Arc<DriveSource>>) -> Self {
        let cancel = CancellationToken::new();
        let poller = Arc::new(Poller::new(engine, interval));
        let handle = poller.spawn(cancel.clone());
        Self {
            poller,
            drive,
            cancel,
            tasks: Mutex::new(vec![handle]),
        }
    }

    /// Run a cycle now. Skipped if one is already in flight.
    pub async fn refresh(&self) -> CycleOutcome {
        self.poller.run_cycle(&self.cancel).await
    }

    /// The last published view, `None` before the first publish.
    pub fn latest_view(&self) -> Option<SharedView> {
        self.poller.latest()
    }

    pub fn state(&self) -> PollerState {
        self.poller.state()
    }

    pub fn poller(&self) -> &Arc<Poller> {
        &self.poller
    }

    pub fn drive(&self) -> Option<&Arc<DriveSource>> {
        self.drive.as_ref()
    }

    /// Refreshed cloud credentials, when the cloud source is configured.
    pub fn token_updates(&self) -> Option<broadcast::Receiver<TokenBundle>> {
        self.drive.as_ref().map(|d| d.subscribe_tokens())
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop polling and wait for spawned tasks. An in-flight cycle is
    /// abandoned and publishes nothing.
    pub async fn teardown(&self) {
        self.cancel.cancel();
        let handles: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for handle in handles {
            match tokio::time::timeout(TEARDOWN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "Guardian task failed during teardown"),
                Err(_) => warn!("Guardian task did not stop in time"),
            }
        }
        info!("Backup guardian stopped");
    }
}

fn build_local(config: &LocalConfig, client: reqwest::Client) -> LocalSource {
    let mut strategies = Vec::new();
    if let Some(base_url) = &config.supervisor_url {
        strategies.push(LocalStrategy::SupervisorApi {
            base_url: base_url.clone(),
            token: config.supervisor_token.clone(),
        });
    }
    if let Some(dir) = &config.backup_dir {
        strategies.push(LocalStrategy::DirectoryScan {
            dir: dir.clone(),
            options: ScanOptions::default(),
        });
    }
    LocalSource::new(client, strategies)
}

fn build_drive(config: &CloudConfig, client: reqwest::Client) -> Result<DriveSource> {
    let credentials = ClientCredentials {
        client_id: config.client_id.trim().to_string(),
        client_secret: config.client_secret.trim().to_string(),
    };
    credentials.validate()?;

    let folder = FolderId::parse(&config.folder)?;
    let tokens = initial_tokens(config)?;

    let mut drive = DriveSource::new(client, credentials, tokens, folder);
    if config.api_base.is_some() || config.token_url.is_some() {
        drive = drive.with_endpoints(
            config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            config
                .token_url
                .clone()
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
        );
    }
    Ok(drive)
}

/// A persisted bundle from an earlier run wins over configured tokens.
fn initial_tokens(config: &CloudConfig) -> Result<TokenBundle> {
    if let Some(cached) = config.token_cache.as_deref().and_then(oauth::load_token_cache) {
        info!("Using cached Google Drive tokens");
        return Ok(cached);
    }

    let access_token = config.access_token.clone().unwrap_or_default();
    let refresh_token = config.refresh_token.clone().filter(|t| !t.is_empty());
    if access_token.is_empty() && refresh_token.is_none() {
        return Err(GuardianError::Config(
            "cloud source needs an access token or a refresh token".into(),
        ));
    }

    let expires_at = match &config.token_expiry {
        Some(expiry) => Some(
            DateTime::parse_from_rfc3339(expiry)
                .map_err(|e| GuardianError::Config(format!("invalid cloud.token_expiry: {e}")))?
                .with_timezone(&Utc),
        ),
        // No access token yet: mark it expired so the first fetch refreshes.
        None if access_token.is_empty() => Some(Utc::now()),
        None => None,
    };

    Ok(TokenBundle {
        access_token,
        refresh_token,
        expires_at,
    })
}

fn spawn_token_persistence(
    mut updates: broadcast::Receiver<TokenBundle>,
    path: PathBuf,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let bundle = tokio::select! {
                _ = cancel.cancelled() => break,
                received = updates.recv() => match received {
                    Ok(bundle) => bundle,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed token updates, waiting for the next one");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };
            let target = path.clone();
            let stored =
                tokio::task::spawn_blocking(move || oauth::store_token_cache(&target, &bundle)).await;
            match stored {
                Ok(Ok(())) => info!(path = %path.display(), "Persisted refreshed Google Drive tokens"),
                Ok(Err(e)) => error!(path = %path.display(), error = %e, "Failed to persist Google Drive tokens"),
                Err(e) => error!(path = %path.display(), error = %e, "Token cache writer panicked"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn local_only(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.local.supervisor_url = None;
        config.local.backup_dir = Some(dir.to_path_buf());
        config
    }

    fn cloud(config: &mut Config) {
        config.cloud.enabled = true;
        config.cloud.client_id = "1234-abc.apps.googleusercontent.com".into();
        config.cloud.client_secret = "GOCSPX-abcdefghijklmnopqrstu".into();
        config.cloud.access_token = Some("from-config".into());
        config.cloud.api_base = Some("http://127.0.0.1:1".into());
        config.cloud.token_url = Some("http://127.0.0.1:1/token".into());
    }

    async fn first_view(guardian: &Guardian) -> SharedView {
        let mut rx = guardian.poller().subscribe();
        let view = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|v| v.is_some()))
            .await
            .expect("no view published")
            .unwrap()
            .clone();
        view.unwrap()
    }

    #[tokio::test]
    async fn test_setup_publishes_initial_view() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("backup_2026-02-15_17-16-00.tar.gz"), b"x")?;
        fs::write(dir.path().join("notes.txt"), b"x")?;

        let guardian = Guardian::setup(&local_only(dir.path()))?;
        let view = first_view(&guardian).await;

        assert_eq!(view.total_count, 1);
        assert_eq!(view.records[0].identifier, "backup_2026-02-15_17-16-00");
        assert!(guardian.token_updates().is_none());

        guardian.teardown().await;
        assert!(guardian.is_shut_down());
        assert_eq!(guardian.refresh().await, CycleOutcome::Abandoned);
        Ok(())
    }

    #[tokio::test]
    async fn test_setup_rejects_bad_cloud_config() {
        let dir = TempDir::new().unwrap();

        let mut config = local_only(dir.path());
        cloud(&mut config);
        config.cloud.client_id = "not-a-google-client".into();
        assert!(matches!(Guardian::setup(&config), Err(GuardianError::Config(_))));

        let mut config = local_only(dir.path());
        cloud(&mut config);
        config.cloud.folder = "https://drive.google.com/drive/my-drive".into();
        assert!(matches!(Guardian::setup(&config), Err(GuardianError::Config(_))));

        let mut config = local_only(dir.path());
        cloud(&mut config);
        config.cloud.access_token = None;
        assert!(matches!(Guardian::setup(&config), Err(GuardianError::Config(_))));
    }

    #[tokio::test]
    async fn test_cached_tokens_override_config() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let cache = dir.path().join("tokens.json");
        oauth::store_token_cache(
            &cache,
            &TokenBundle {
                access_token: "from-cache".into(),
                refresh_token: Some("r".into()),
                expires_at: None,
            },
        )?;

        let mut config = local_only(dir.path());
        cloud(&mut config);
        config.cloud.token_cache = Some(cache);

        let guardian = Guardian::setup(&config)?;
        let drive = guardian.drive().expect("cloud source configured");
        assert_eq!(drive.tokens().await.access_token, "from-cache");
        assert!(guardian.token_updates().is_some());

        // The unreachable Drive endpoint only fails its own source.
        let view = first_view(&guardian).await;
        assert_eq!(view.failures.len(), 1);
        assert!(view.failures[0].source == crate::model::SourceTag::CloudDrive);

        guardian.teardown().await;
        Ok(())
    }

    #[test]
    fn test_missing_access_token_starts_expired() {
        let mut config = Config::default();
        cloud(&mut config);
        config.cloud.access_token = None;
        config.cloud.refresh_token = Some("r".into());

        let tokens = initial_tokens(&config.cloud).unwrap();
        assert!(tokens.is_expired(Utc::now()));
        assert!(tokens.can_refresh());
    }

    #[tokio::test]
    async fn test_token_updates_are_written_to_cache() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache/tokens.json");
        let (tx, rx) = broadcast::channel(4);
        let cancel = CancellationToken::new();
        let handle = spawn_token_persistence(rx, path.clone(), cancel.clone());

        let bundle = TokenBundle {
            access_token: "fresh".into(),
            refresh_token: Some("r".into()),
            expires_at: None,
        };
        tx.send(bundle.clone()).unwrap();

        let mut stored = None;
        for _ in 0..100 {
            stored = oauth::load_token_cache(&path);
            if stored.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(stored, Some(bundle));

        cancel.cancel();
        handle.await.unwrap();
    }
}
