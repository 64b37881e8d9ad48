//! Backup directory scanning.
//!
//! Lists archive files in the host's backup directory and reads their size
//! and modification time from file metadata. Blocking; callers run it on
//! `spawn_blocking`.

use std::path::Path;
use walkdir::{DirEntry, WalkDir};

use crate::normalize::filename::is_backup_file;
use crate::normalize::raw::ArchiveFile;

/// Options for scanning a backup directory
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Follow symbolic links
    pub follow_links: bool,

    /// Maximum depth below the root (1 = direct children only)
    pub max_depth: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            follow_links: true,
            max_depth: 1,
        }
    }
}

/// Collect every backup archive under `root`.
///
/// Entries that vanish or cannot be stat'ed mid-scan are skipped; only a
/// failure to read `root` itself is an error.
pub fn scan_archives(root: &Path, options: &ScanOptions) -> std::io::Result<Vec<ArchiveFile>> {
    // Surface a missing or unreadable root as an error instead of an empty scan.
    std::fs::read_dir(root)?;

    let walker = WalkDir::new(root)
        .follow_links(options.follow_links)
        .min_depth(1)
        .max_depth(options.max_depth);

    let mut archives = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable entry in backup directory");
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_archive(&entry) {
            continue;
        }

        match archive_from_entry(&entry) {
            Ok(archive) => archives.push(archive),
            Err(e) => {
                tracing::debug!(path = %entry.path().display(), error = %e, "Skipping archive");
            }
        }
    }

    Ok(archives)
}

fn is_archive(entry: &DirEntry) -> bool {
    is_backup_file(&entry.file_name().to_string_lossy())
}

fn archive_from_entry(entry: &DirEntry) -> std::io::Result<ArchiveFile> {
    let metadata = entry.metadata()?;
    Ok(ArchiveFile {
        path: entry.path().to_path_buf(),
        file_name: entry.file_name().to_string_lossy().into_owned(),
        size_bytes: metadata.len(),
        modified: metadata.modified()?,
    })
}
