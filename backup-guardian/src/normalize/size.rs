//! Size coercion into bytes.
//!
//! Sources disagree on units. The supervisor usually reports megabytes as a
//! float, sometimes raw bytes, sometimes a formatted string. Anything up to
//! [`MEGABYTE_THRESHOLD`] is read as megabytes; this is a best-effort guess.

use super::raw::RawSize;
use crate::model::record::BYTES_PER_MEGABYTE;
use crate::utils::{GuardianError, Result};

/// Reported magnitudes up to and including this are taken to already be megabytes.
pub const MEGABYTE_THRESHOLD: f64 = 1024.0;

/// Resolve a unit-ambiguous reported size to bytes.
pub fn resolve_reported_size(raw: Option<&RawSize>) -> Result<u64> {
    let magnitude = match raw {
        None => return Ok(0),
        Some(RawSize::Number(n)) => *n,
        Some(RawSize::Text(text)) => parse_numeric_text(text),
    };

    if !magnitude.is_finite() || magnitude < 0.0 {
        return Err(GuardianError::InvalidRecord(format!(
            "size {magnitude} is not a non-negative number"
        )));
    }

    let bytes = if magnitude <= MEGABYTE_THRESHOLD {
        magnitude * BYTES_PER_MEGABYTE
    } else {
        magnitude
    };
    Ok(bytes.round() as u64)
}

/// Parse a size the source guarantees is in bytes (Drive's int64-as-string).
pub fn parse_byte_count(raw: Option<&str>) -> u64 {
    raw.map(|text| {
        text.chars()
            .filter(char::is_ascii_digit)
            .collect::<String>()
            .parse()
            .unwrap_or(0)
    })
    .unwrap_or(0)
}

/// Keep digits and dots, then parse. Garbage reads as zero.
fn parse_numeric_text(text: &str) -> f64 {
    text.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect::<String>()
        .parse()
        .unwrap_or(0.0)
}
