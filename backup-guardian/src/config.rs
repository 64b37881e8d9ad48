//! Configuration for the guardian.
//!
//! Loads configuration from a TOML file with environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::{GuardianError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub poller: PollerConfig,
    pub server: ServerConfig,
    pub log: LogConfig,
    pub local: LocalConfig,
    pub cloud: CloudConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Seconds between refresh cycles
    pub interval_secs: u64,

    /// Upper bound for a single source fetch, in seconds
    pub source_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the display API listens on
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Include the module path in each line
    pub with_target: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub enabled: bool,

    /// Supervisor API base URL; unset skips the API strategy
    pub supervisor_url: Option<String>,

    pub supervisor_token: Option<String>,

    /// Directory holding backup archives; unset skips the scan strategy
    pub backup_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub enabled: bool,
    pub client_id: String,
    pub client_secret: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,

    /// RFC 3339 expiry of `access_token`, if known
    pub token_expiry: Option<String>,

    /// Folder id or folder URL; empty means the Drive root
    pub folder: String,

    pub api_base: Option<String>,
    pub token_url: Option<String>,

    /// Where refreshed tokens are persisted between runs
    pub token_cache: Option<PathBuf>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            source_timeout_secs: 30,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8099".to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: false,
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            supervisor_url: Some("http://supervisor".to_string()),
            supervisor_token: None,
            backup_dir: Some(PathBuf::from("/backup")),
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            client_id: String::new(),
            client_secret: String::new(),
            access_token: None,
            refresh_token: None,
            token_expiry: None,
            folder: "root".to_string(),
            api_base: None,
            token_url: None,
            token_cache: None,
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply overrides from the process environment, after loading `.env`
    /// if one exists.
    pub fn apply_env_overrides(&mut self) {
        dotenvy::dotenv().ok();
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("SUPERVISOR_TOKEN") {
            self.local.supervisor_token = Some(token);
        }
        if let Some(id) = get("GUARDIAN_CLOUD_CLIENT_ID") {
            self.cloud.client_id = id;
        }
        if let Some(secret) = get("GUARDIAN_CLOUD_CLIENT_SECRET") {
            self.cloud.client_secret = secret;
        }
        if let Some(token) = get("GUARDIAN_CLOUD_ACCESS_TOKEN") {
            self.cloud.access_token = Some(token);
        }
        if let Some(token) = get("GUARDIAN_CLOUD_REFRESH_TOKEN") {
            self.cloud.refresh_token = Some(token);
        }
        if let Some(folder) = get("GUARDIAN_CLOUD_FOLDER") {
            self.cloud.folder = folder;
        }
    }

    /// Reject settings the guardian cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poller.interval_secs == 0 {
            return Err(GuardianError::Config("poller.interval_secs must be greater than 0".into()));
        }
        if self.poller.source_timeout_secs == 0 {
            return Err(GuardianError::Config(
                "poller.source_timeout_secs must be greater than 0".into(),
            ));
        }
        if !self.local.enabled && !self.cloud.enabled {
            return Err(GuardianError::Config("no backup source is enabled".into()));
        }
        if self.local.enabled
            && self.local.supervisor_url.is_none()
            && self.local.backup_dir.is_none()
        {
            return Err(GuardianError::Config(
                "local source needs supervisor_url or backup_dir".into(),
            ));
        }
        if let Some(expiry) = &self.cloud.token_expiry {
            chrono::DateTime::parse_from_rfc3339(expiry).map_err(|e| {
                GuardianError::Config(format!("cloud.token_expiry is not RFC 3339: {e}"))
            })?;
        }
        Ok(())
    }
}
