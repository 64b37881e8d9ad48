//! Google Drive backups.
//!
//! Lists backup archives inside one Drive folder. An expired token is
//! refreshed before listing; a 401 from the listing triggers one refresh and
//! exactly one retry.

pub mod folder;
pub mod oauth;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use super::BackupSource;
use crate::model::{BackupRecord, SourceTag};
use crate::normalize::filename::is_backup_file;
use crate::normalize::raw::DriveFile;
use crate::normalize::{normalize_all, normalize_drive};
use crate::utils::{GuardianError, Result};

pub use folder::FolderId;
pub use oauth::{ClientCredentials, TokenBundle};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const PAGE_SIZE: &str = "100";
const MAX_PAGES: usize = 50;
const LIST_FIELDS: &str = "nextPageToken, files(id, name, size, createdTime, modifiedTime, md5Checksum)";
const TOKEN_CHANNEL_CAPACITY: usize = 8;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<serde_json::Value>,
    #[serde(default)]
    next_page_token: Option<String>,
}

pub struct DriveSource {
    client: reqwest::Client,
    api_base: String,
    token_url: String,
    folder: FolderId,
    credentials: ClientCredentials,
    tokens: RwLock<TokenBundle>,
    token_tx: broadcast::Sender<TokenBundle>,
}

impl DriveSource {
    pub fn new(
        client: reqwest::Client,
        credentials: ClientCredentials,
        tokens: TokenBundle,
        folder: FolderId,
    ) -> Self {
        let (token_tx, _) = broadcast::channel(TOKEN_CHANNEL_CAPACITY);
        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            folder,
            credentials,
            tokens: RwLock::new(tokens),
            token_tx,
        }
    }

    /// Point the source at different API and token endpoints.
    pub fn with_endpoints(mut self, api_base: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self.token_url = token_url.into();
        self
    }

    pub async fn tokens(&self) -> TokenBundle {
        self.tokens.read().await.clone()
    }

    /// Every successfully refreshed bundle is sent here so it can be persisted.
    pub fn subscribe_tokens(&self) -> broadcast::Receiver<TokenBundle> {
        self.token_tx.subscribe()
    }

    /// Exchange the refresh token for a new access token and store it.
    pub async fn refresh_access_token(&self) -> Result<TokenBundle> {
        let refresh_token = {
            let tokens = self.tokens.read().await;
            if !tokens.can_refresh() {
                return Err(GuardianError::Authentication(
                    "access token rejected and no refresh token is configured".into(),
                ));
            }
            tokens.refresh_token.clone().unwrap_or_default()
        };

        let bundle = oauth::exchange_refresh_token(
            &self.client,
            &self.token_url,
            &self.credentials,
            &refresh_token,
        )
        .await?;

        *self.tokens.write().await = bundle.clone();
        // Nobody listening is fine.
        let _ = self.token_tx.send(bundle.clone());
        info!(expires_at = ?bundle.expires_at, "Refreshed Google Drive access token");
        Ok(bundle)
    }

    fn query(&self) -> String {
        format!(
            "'{}' in parents and (name contains '.tar' or name contains '.tgz') and trashed=false",
            self.folder
        )
    }

    async fn list_files(&self) -> Result<Vec<DriveFile>> {
        let access_token = self.tokens.read().await.access_token.clone();
        let url = format!("{}/files", self.api_base);
        let query = self.query();
        let mut page_token: Option<String> = None;
        let mut values = Vec::new();

        for _ in 0..MAX_PAGES {
            let mut params = vec![
                ("q", query.as_str()),
                ("spaces", "drive"),
                ("fields", LIST_FIELDS),
                ("pageSize", PAGE_SIZE),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let response = self
                .client
                .get(&url)
                .bearer_auth(&access_token)
                .query(&params)
                .send()
                .await?;

            let status = response.status();
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(GuardianError::Unauthorized(format!("Drive listing returned {status}")));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(GuardianError::SourceUnavailable(format!(
                    "Drive listing returned {status}: {body}"
                )));
            }

            let page: FileList = response.json().await?;
            values.extend(page.files);
            page_token = page.next_page_token.filter(|t| !t.is_empty());
            if page_token.is_none() {
                break;
            }
        }

        if page_token.is_some() {
            warn!(pages = MAX_PAGES, "Drive listing truncated");
        }

        Ok(values
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<DriveFile>(value) {
                Ok(file) => Some(file),
                Err(e) => {
                    warn!(error = %e, "Dropping unreadable Drive file entry");
                    None
                }
            })
            .collect())
    }

    async fn list_with_refresh(&self) -> Result<Vec<DriveFile>> {
        // At most one refresh attempt per fetch, successful or not.
        let mut refresh_attempted = false;
        if self.tokens.read().await.is_expired(Utc::now()) {
            refresh_attempted = true;
            if let Err(e) = self.refresh_access_token().await {
                warn!(error = %e, "Could not refresh expired Drive token, trying anyway");
            }
        }

        match self.list_files().await {
            Err(e) if e.is_unauthorized() && !refresh_attempted => {
                warn!(error = %e, "Drive rejected the access token, refreshing and retrying once");
                self.refresh_access_token().await?;
                self.list_files().await
            }
            other => other,
        }
    }
}

#[async_trait]
impl BackupSource for DriveSource {
    fn tag(&self) -> SourceTag {
        SourceTag::CloudDrive
    }

    async fn fetch(&self) -> Result<Vec<BackupRecord>> {
        let files = self.list_with_refresh().await?;
        let total = files.len();

        let backups: Vec<DriveFile> = files
            .into_iter()
            .filter(|file| {
                let keep = is_backup_file(&file.name);
                if !keep {
                    debug!(name = %file.name, "Skipping non-backup Drive file");
                }
                keep
            })
            .collect();

        info!(folder = %self.folder, listed = total, backups = backups.len(), "Listed Google Drive backups");
        Ok(normalize_all(SourceTag::CloudDrive, backups, normalize_drive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_server;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeDrive {
        list_calls: AtomicUsize,
        token_calls: AtomicUsize,
        /// Access token the listing endpoint accepts.
        valid_token: String,
        /// Token handed out by the token endpoint.
        issued_token: String,
    }

    async fn list(
        State(fake): State<Arc<FakeDrive>>,
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> impl IntoResponse {
        fake.list_calls.fetch_add(1, Ordering::SeqCst);
        let expected = format!("Bearer {}", fake.valid_token);
        let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or("");
        if auth != expected {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_credentials"})));
        }
        assert!(params["q"].starts_with("'FOLDER1' in parents"));

        match params.get("pageToken").map(String::as_str) {
            None => (
                StatusCode::OK,
                Json(json!({
                    "nextPageToken": "page-2",
                    "files": [
                        {"id": "f1", "name": "backup_2026-02-15_17-16-00.tar.gz", "size": "5242880",
                         "modifiedTime": "2026-02-16T00:00:00Z", "md5Checksum": "abc"},
                        {"id": "f2", "name": "readme.tar.txt", "size": "10"}
                    ]
                })),
            ),
            Some(_) => (
                StatusCode::OK,
                Json(json!({
                    "files": [
                        {"id": "f3", "name": "homeassistant.tar", "size": "1048576",
                         "modifiedTime": "2026-02-10T10:00:00Z"}
                    ]
                })),
            ),
        }
    }

    async fn token(State(fake): State<Arc<FakeDrive>>) -> impl IntoResponse {
        fake.token_calls.fetch_add(1, Ordering::SeqCst);
        Json(json!({"access_token": fake.issued_token, "expires_in": 3600}))
    }

    async fn start(fake: Arc<FakeDrive>) -> String {
        let router = Router::new()
            .route("/files", get(list))
            .route("/token", post(token))
            .with_state(fake);
        spawn_server(router).await
    }

    fn source(base: &str, access_token: &str, refresh_token: Option<&str>) -> DriveSource {
        DriveSource::new(
            reqwest::Client::new(),
            ClientCredentials {
                client_id: "1234-abc.apps.googleusercontent.com".into(),
                client_secret: "GOCSPX-abcdefghijklmnopqrstu".into(),
            },
            TokenBundle {
                access_token: access_token.into(),
                refresh_token: refresh_token.map(String::from),
                expires_at: None,
            },
            FolderId::parse("FOLDER1").unwrap(),
        )
        .with_endpoints(base, format!("{base}/token"))
    }

    fn fake(valid: &str, issued: &str) -> Arc<FakeDrive> {
        Arc::new(FakeDrive {
            valid_token: valid.into(),
            issued_token: issued.into(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_lists_all_pages_and_filters_non_backups() {
        let fake = fake("good", "unused");
        let base = start(fake.clone()).await;

        let records = source(&base, "good", None).fetch().await.unwrap();

        let ids: Vec<_> = records.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f3"]);
        assert_eq!(records[0].size_megabytes(), 5.0);
        assert!(records[0].is_compressed);
        assert_eq!(records[0].content_hash, "abc");
        assert_eq!(records[1].content_hash, "f3");
        assert_eq!(fake.list_calls.load(Ordering::SeqCst), 2);
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_once_and_retries() {
        let fake = fake("fresh", "fresh");
        let base = start(fake.clone()).await;
        let drive = source(&base, "stale", Some("refresh-1"));
        let mut updates = drive.subscribe_tokens();

        let records = drive.fetch().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);
        // one rejected call, then two pages
        assert_eq!(fake.list_calls.load(Ordering::SeqCst), 3);
        assert_eq!(drive.tokens().await.access_token, "fresh");
        assert_eq!(updates.try_recv().unwrap().refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_second_unauthorized_is_a_failure() {
        let fake = fake("never-issued", "still-wrong");
        let base = start(fake.clone()).await;

        let err = source(&base, "stale", Some("refresh-1")).fetch().await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fake.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unauthorized_without_refresh_token() {
        let fake = fake("good", "unused");
        let base = start(fake.clone()).await;

        let err = source(&base, "stale", None).fetch().await.unwrap_err();

        assert!(matches!(err, GuardianError::Authentication(_)));
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_before_listing() {
        let fake = fake("fresh", "fresh");
        let base = start(fake.clone()).await;
        let drive = source(&base, "stale", Some("refresh-1"));
        drive.tokens.write().await.expires_at = Some(Utc::now() - chrono::Duration::minutes(5));

        let records = drive.fetch().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fake.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_proactive_refresh_is_not_repeated_on_401() {
        let rejecting = Arc::new(FakeDrive {
            valid_token: "fresh".into(),
            ..Default::default()
        });
        let router = Router::new()
            .route("/files", get(list))
            .route(
                "/token",
                post(|State(fake): State<Arc<FakeDrive>>| async move {
                    fake.token_calls.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"})))
                }),
            )
            .with_state(rejecting.clone());
        let base = spawn_server(router).await;
        let drive = source(&base, "stale", Some("revoked"));
        drive.tokens.write().await.expires_at = Some(Utc::now() - chrono::Duration::minutes(5));

        let err = drive.fetch().await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(rejecting.token_calls.load(Ordering::SeqCst), 1);
        assert_eq!(rejecting.list_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_query_shape() {
        let drive = source("http://unused", "a", None);
        assert_eq!(
            drive.query(),
            "'FOLDER1' in parents and (name contains '.tar' or name contains '.tgz') and trashed=false"
        );
    }
}
