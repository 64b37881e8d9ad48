//! Filesystem access for the local backup source.

pub mod walker;

pub use walker::{scan_archives, ScanOptions};
