//! OAuth2 credentials for the Drive API.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::utils::{GuardianError, Result};

/// Client ids issued by Google end with this suffix.
pub const CLIENT_ID_SUFFIX: &str = ".apps.googleusercontent.com";
pub const MIN_CLIENT_SECRET_LEN: usize = 20;

/// Tokens count as expired this long before their stated expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenBundle {
    /// Unknown expiry counts as valid; the API answers 401 if it is not.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::seconds(EXPIRY_SKEW_SECS) >= expires_at,
            None => false,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    /// Format check only; nothing is sent to the provider.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() || self.client_secret.trim().is_empty() {
            return Err(GuardianError::Config("cloud client id and secret are required".into()));
        }
        if !self.client_id.ends_with(CLIENT_ID_SUFFIX) {
            return Err(GuardianError::Config(format!(
                "cloud client id must end with {CLIENT_ID_SUFFIX}"
            )));
        }
        if self.client_secret.len() < MIN_CLIENT_SECRET_LEN {
            return Err(GuardianError::Config("cloud client secret is too short".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Exchange a refresh token for a new access token.
///
/// The provider usually omits the refresh token from the answer; the one we
/// sent stays valid and is carried over.
pub async fn exchange_refresh_token(
    client: &reqwest::Client,
    token_url: &str,
    credentials: &ClientCredentials,
    refresh_token: &str,
) -> Result<TokenBundle> {
    let response = client
        .post(token_url)
        .form(&[
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GuardianError::Authentication(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let grant: TokenResponse = response.json().await?;
    Ok(TokenBundle {
        access_token: grant.access_token,
        refresh_token: grant
            .refresh_token
            .or_else(|| Some(refresh_token.to_string())),
        expires_at: grant
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs)),
    })
}

/// Read a token bundle persisted by a previous run, if any.
pub fn load_token_cache(path: &Path) -> Option<TokenBundle> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(bundle) => Some(bundle),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable token cache");
            None
        }
    }
}

/// Write the cache through a sibling temp file. The file holds credentials,
/// so on unix it is readable by the owner only.
pub fn store_token_cache(path: &Path, bundle: &TokenBundle) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(&tmp)?;
    // `mode` only applies on creation; a leftover temp file keeps its bits.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(&serde_json::to_vec_pretty(bundle)?)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(&tmp, path)?;
    Ok(())
}
