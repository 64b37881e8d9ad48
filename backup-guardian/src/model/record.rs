//! Canonical backup record shared by every source.

use chrono::{DateTime, Local};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

pub const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, serde::Serialize)]
pub enum SourceTag {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "cloud-drive")]
    CloudDrive,
}

impl SourceTag {
    pub const ALL: [SourceTag; 2] = [SourceTag::Local, SourceTag::CloudDrive];

    /// Inverse of [`SourceTag::as_str`].
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.as_str() == slug)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Local => "local",
            SourceTag::CloudDrive => "cloud-drive",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SourceTag::Local => "Local",
            SourceTag::CloudDrive => "Google Drive",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One backup artifact, normalized. Only the normalizer builds these.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupRecord {
    pub name: String,
    /// Slug or file id; unique within `source_tag` only.
    pub identifier: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Local>,
    pub content_hash: String,
    pub kind: String,
    pub is_protected: bool,
    pub is_compressed: bool,
    pub source_tag: SourceTag,
    /// File path for directory-scanned archives.
    pub location: Option<PathBuf>,
}

impl BackupRecord {
    pub fn size_megabytes(&self) -> f64 {
        round2(self.size_bytes as f64 / BYTES_PER_MEGABYTE)
    }

    pub fn source_display_name(&self) -> &'static str {
        self.source_tag.display_name()
    }

    /// Identity across the whole view; no cross-source dedup happens.
    pub fn key(&self) -> (SourceTag, &str) {
        (self.source_tag, self.identifier.as_str())
    }
}

impl Serialize for BackupRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("BackupRecord", 14)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("identifier", &self.identifier)?;
        s.serialize_field("size_bytes", &self.size_bytes)?;
        s.serialize_field("size_mb", &self.size_megabytes())?;
        s.serialize_field("created_at", &self.created_at.to_rfc3339())?;
        s.serialize_field("date", &self.created_at.format("%Y-%m-%d").to_string())?;
        s.serialize_field("time", &self.created_at.format("%H:%M:%S").to_string())?;
        s.serialize_field("hash", &self.content_hash)?;
        s.serialize_field("type", &self.kind)?;
        s.serialize_field("protected", &self.is_protected)?;
        s.serialize_field("compressed", &self.is_compressed)?;
        s.serialize_field("destination", &self.source_tag)?;
        s.serialize_field("destination_name", self.source_display_name())?;
        s.serialize_field(
            "location",
            &self.location.as_ref().map(|path| path.display().to_string()),
        )?;
        s.end()
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
