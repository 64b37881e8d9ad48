//! Drive folder references.

use std::fmt;
use url::Url;

use crate::utils::{GuardianError, Result};

pub const ROOT_FOLDER: &str = "root";

/// A validated Drive folder id, safe to embed in a `files.list` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderId(String);

impl FolderId {
    /// Accept a bare folder id or a folder URL such as
    /// `https://drive.google.com/drive/u/0/folders/<id>?usp=sharing`.
    /// Blank input means the Drive root.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Self(ROOT_FOLDER.to_string()));
        }

        if input.starts_with("http://") || input.starts_with("https://") {
            return Self::from_url(input);
        }

        if is_valid_id(input) {
            Ok(Self(input.to_string()))
        } else {
            Err(GuardianError::Config(format!("invalid folder id: {input}")))
        }
    }

    fn from_url(input: &str) -> Result<Self> {
        let url = Url::parse(input)
            .map_err(|e| GuardianError::Config(format!("invalid folder URL {input}: {e}")))?;

        let id = url
            .path_segments()
            .and_then(|mut segments| {
                segments.by_ref().find(|s| *s == "folders")?;
                segments.next()
            })
            .filter(|id| is_valid_id(id))
            .ok_or_else(|| {
                GuardianError::Config(format!("no folder id after folders/ in {input}"))
            })?;

        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_id() {
        assert_eq!(FolderId::parse("ABC123").unwrap().as_str(), "ABC123");
        assert_eq!(FolderId::parse("1a_B-c").unwrap().as_str(), "1a_B-c");
    }

    #[test]
    fn test_blank_is_root() {
        assert_eq!(FolderId::parse("  ").unwrap().as_str(), "root");
    }

    #[test]
    fn test_folder_urls() {
        assert_eq!(
            FolderId::parse("https://drive.example.com/drive/folders/ABC123")
                .unwrap()
                .as_str(),
            "ABC123"
        );
        assert_eq!(
            FolderId::parse("https://drive.google.com/drive/u/0/folders/XyZ_9-q?usp=sharing")
                .unwrap()
                .as_str(),
            "XyZ_9-q"
        );
    }

    #[test]
    fn test_rejects_urls_without_folder_segment() {
        assert!(FolderId::parse("https://drive.example.com/drive/my-drive").is_err());
        assert!(FolderId::parse("https://drive.example.com/drive/folders/").is_err());
        assert!(FolderId::parse("https://").is_err());
    }

    #[test]
    fn test_rejects_query_breaking_ids() {
        assert!(FolderId::parse("abc' or '1'='1").is_err());
        assert!(FolderId::parse("drive.google.com/drive/folders/ABC").is_err());
    }
}
