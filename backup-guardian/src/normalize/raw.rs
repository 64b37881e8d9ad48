//! Raw descriptor shapes, one per source, exactly as each source reports them.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::SystemTime;

/// Size as reported by the supervisor: usually a float in megabytes, but
/// older hosts send bytes or a formatted string such as `"12.5 MB"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawSize {
    Number(f64),
    Text(String),
}

/// One entry of the supervisor's `GET /backups` listing.
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorBackup {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub size: Option<RawSize>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub protected: Option<bool>,
    #[serde(default)]
    pub compressed: Option<bool>,
}

/// A backup archive found on disk; everything comes from `stat`.
#[derive(Debug, Clone)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    pub modified: SystemTime,
}

/// One file from the Drive `files.list` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Drive encodes int64 values as strings.
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
    #[serde(default)]
    pub md5_checksum: Option<String>,
}
