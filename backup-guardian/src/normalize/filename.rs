//! Backup filename conventions.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

/// Archive suffixes recognised as backups, longest first.
pub const BACKUP_SUFFIXES: [&str; 3] = [".tar.gz", ".tgz", ".tar"];

pub fn is_backup_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    BACKUP_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

pub fn is_compressed_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".gz") || lower.ends_with(".tgz")
}

/// `abc123.tar.gz` -> `abc123`
pub fn strip_backup_suffix(name: &str) -> &str {
    let lower = name.to_ascii_lowercase();
    BACKUP_SUFFIXES
        .iter()
        .find(|suffix| lower.ends_with(*suffix))
        .map(|suffix| &name[..name.len() - suffix.len()])
        .unwrap_or(name)
}

/// Extract the creation time embedded in a backup filename.
///
/// Recognises `YYYY-MM-DD`, optionally followed by `_` or a space and
/// `HH?MM?SS` where `?` is `:` or `-`. The embedded time is UTC. The first
/// date-time match wins over any bare date, and decides alone: if its
/// values are impossible the name yields no time at all.
pub fn date_from_filename(name: &str) -> Option<DateTime<Local>> {
    let bytes = name.as_bytes();

    let stamped = (0..bytes.len())
        .find_map(|start| Some((date_at(bytes, start)?, time_at(bytes, start + 10)?)));
    if let Some((date, (hour, minute, second))) = stamped {
        let naive = parse_date(date)?.and_hms_opt(hour, minute, second)?;
        return Some(to_local(naive));
    }

    let date = (0..bytes.len()).find_map(|start| date_at(bytes, start))?;
    parse_date(date)?.and_hms_opt(0, 0, 0).map(to_local)
}

fn to_local(naive: NaiveDateTime) -> DateTime<Local> {
    naive.and_utc().with_timezone(&Local)
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

/// A `DDDD-DD-DD` run starting at `start`.
fn date_at(bytes: &[u8], start: usize) -> Option<&str> {
    let candidate = bytes.get(start..start + 10)?;
    let shaped = candidate.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        _ => b.is_ascii_digit(),
    });
    if !shaped {
        return None;
    }
    std::str::from_utf8(candidate).ok()
}

/// A `_HH:MM:SS` run starting at `start`, not yet range checked.
fn time_at(bytes: &[u8], start: usize) -> Option<(u32, u32, u32)> {
    let candidate = bytes.get(start..start + 9)?;
    if candidate[0] != b'_' && candidate[0] != b' ' {
        return None;
    }
    if !matches!(candidate[3], b':' | b'-') || !matches!(candidate[6], b':' | b'-') {
        return None;
    }
    let pair = |i: usize| -> Option<u32> {
        let (hi, lo) = (candidate[i], candidate[i + 1]);
        if hi.is_ascii_digit() && lo.is_ascii_digit() {
            Some(u32::from(hi - b'0') * 10 + u32::from(lo - b'0'))
        } else {
            None
        }
    };
    Some((pair(1)?, pair(4)?, pair(7)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_backup_patterns() {
        assert!(is_backup_file("backup_2026-02-15.tar"));
        assert!(is_backup_file("backup.tar.gz"));
        assert!(is_backup_file("BACKUP.TGZ"));
        assert!(!is_backup_file("notes.txt"));
        assert!(!is_backup_file("archive.tar.bz2"));
    }

    #[test]
    fn test_compression_inference() {
        assert!(is_compressed_name("a.tar.gz"));
        assert!(is_compressed_name("a.tgz"));
        assert!(!is_compressed_name("a.tar"));
    }

    #[test]
    fn test_strip_suffix() {
        assert_eq!(strip_backup_suffix("abc123.tar"), "abc123");
        assert_eq!(strip_backup_suffix("abc123.tar.gz"), "abc123");
        assert_eq!(strip_backup_suffix("abc123.TGZ"), "abc123");
        assert_eq!(strip_backup_suffix("plain"), "plain");
    }

    #[test]
    fn test_underscore_dash_time() {
        let expected = Utc
            .with_ymd_and_hms(2026, 2, 15, 17, 16, 0)
            .unwrap()
            .with_timezone(&Local);
        assert_eq!(
            date_from_filename("backup_2026-02-15_17-16-00.tar.gz"),
            Some(expected)
        );
    }

    #[test]
    fn test_space_colon_time() {
        let expected = Utc
            .with_ymd_and_hms(2026, 2, 15, 17, 16, 0)
            .unwrap()
            .with_timezone(&Local);
        assert_eq!(
            date_from_filename("Full backup 2026-02-15 17:16:00.tar"),
            Some(expected)
        );
    }

    #[test]
    fn test_date_only() {
        let expected = Utc
            .with_ymd_and_hms(2026, 2, 15, 0, 0, 0)
            .unwrap()
            .with_timezone(&Local);
        assert_eq!(date_from_filename("backup-2026-02-15.tar"), Some(expected));
    }

    #[test]
    fn test_no_date() {
        assert_eq!(date_from_filename("a1b2c3d4.tar"), None);
        assert_eq!(date_from_filename("backup_2026-13-40.tar"), None);
    }

    #[test]
    fn test_impossible_time_yields_nothing() {
        assert_eq!(date_from_filename("backup_2026-02-15_25-00-00.tar.gz"), None);
        assert_eq!(date_from_filename("backup_2026-02-30_10-00-00.tar"), None);
        // A later bare date does not rescue a broken date-time.
        assert_eq!(date_from_filename("backup_2026-02-15_12-61-00_2026-02-16.tar"), None);
    }
}
