//! Record normalization.
//!
//! Every source has its own raw descriptor type and its own function that
//! shapes it into a [`BackupRecord`]. A descriptor that cannot be shaped is
//! dropped by [`normalize_all`] without affecting its siblings.

pub mod filename;
pub mod raw;
pub mod size;
pub mod timestamp;

use chrono::{DateTime, Local};

use crate::model::{BackupRecord, SourceTag};
use crate::utils::{GuardianError, Result};
use raw::{ArchiveFile, DriveFile, SupervisorBackup};

pub const DEFAULT_KIND: &str = "full";

/// Shape a supervisor API entry.
pub fn normalize_supervisor(raw: SupervisorBackup) -> Result<BackupRecord> {
    let identifier = raw.slug.trim().to_string();
    if identifier.is_empty() {
        return Err(GuardianError::InvalidRecord("supervisor backup without slug".into()));
    }

    Ok(BackupRecord {
        name: non_empty(raw.name).unwrap_or_else(|| identifier.clone()),
        size_bytes: size::resolve_reported_size(raw.size.as_ref())?,
        created_at: timestamp::resolve_timestamp(raw.date.as_deref()),
        // The supervisor exposes no checksum.
        content_hash: identifier.clone(),
        kind: non_empty(raw.kind).unwrap_or_else(|| DEFAULT_KIND.to_string()),
        is_protected: raw.protected.unwrap_or(false),
        // Supervisor archives are compressed unless it says otherwise.
        is_compressed: raw.compressed.unwrap_or(true),
        source_tag: SourceTag::Local,
        location: None,
        identifier,
    })
}

/// Shape an archive discovered by scanning the backup directory.
pub fn normalize_archive(raw: ArchiveFile) -> Result<BackupRecord> {
    let identifier = filename::strip_backup_suffix(&raw.file_name).to_string();
    if identifier.is_empty() {
        return Err(GuardianError::InvalidRecord(format!(
            "archive {} has no usable name",
            raw.path.display()
        )));
    }

    Ok(BackupRecord {
        name: raw.file_name.clone(),
        size_bytes: raw.size_bytes,
        created_at: DateTime::<Local>::from(raw.modified),
        content_hash: identifier.clone(),
        kind: DEFAULT_KIND.to_string(),
        is_protected: false,
        is_compressed: filename::is_compressed_name(&raw.file_name),
        source_tag: SourceTag::Local,
        location: Some(raw.path),
        identifier,
    })
}

/// Shape a Drive file. The filename date wins over Drive's own timestamps,
/// since uploads happen well after the backup was taken.
pub fn normalize_drive(raw: DriveFile) -> Result<BackupRecord> {
    let identifier = raw.id.trim().to_string();
    if identifier.is_empty() {
        return Err(GuardianError::InvalidRecord(format!(
            "drive file {:?} without id",
            raw.name
        )));
    }

    let created_at = filename::date_from_filename(&raw.name)
        .or_else(|| raw.modified_time.as_deref().and_then(timestamp::parse_timestamp))
        .unwrap_or_else(|| timestamp::resolve_timestamp(raw.created_time.as_deref()));

    Ok(BackupRecord {
        name: if raw.name.is_empty() { identifier.clone() } else { raw.name.clone() },
        size_bytes: size::parse_byte_count(raw.size.as_deref()),
        created_at,
        content_hash: non_empty(raw.md5_checksum).unwrap_or_else(|| identifier.clone()),
        kind: DEFAULT_KIND.to_string(),
        is_protected: false,
        is_compressed: filename::is_compressed_name(&raw.name),
        source_tag: SourceTag::CloudDrive,
        location: None,
        identifier,
    })
}

/// Normalize a batch, logging and dropping descriptors that fail.
pub fn normalize_all<T, F>(source: SourceTag, raws: Vec<T>, normalize: F) -> Vec<BackupRecord>
where
    F: Fn(T) -> Result<BackupRecord>,
{
    let total = raws.len();
    let records: Vec<BackupRecord> = raws
        .into_iter()
        .filter_map(|raw| match normalize(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "Dropping malformed backup descriptor");
                None
            }
        })
        .collect();

    if records.len() < total {
        tracing::info!(
            source = %source,
            kept = records.len(),
            dropped = total - records.len(),
            "Normalized backup descriptors"
        );
    }
    records
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
