//! Content-derived revision tokens.

use std::fs;
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

/// Revision token for a blob of content: lowercase hex MD5.
#[must_use]
pub fn revision_of(content: &[u8]) -> String {
    hex::encode(Md5::digest(content))
}

/// Revision over several files, hashed in order as one stream.
///
/// Returns the failing path alongside the I/O error.
pub(crate) fn combined_revision(paths: &[PathBuf]) -> Result<String, (PathBuf, std::io::Error)> {
    let mut hasher = Md5::new();
    for path in paths {
        let content = read(path)?;
        hasher.update(&content);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn read(path: &Path) -> Result<Vec<u8>, (PathBuf, std::io::Error)> {
    fs::read(path).map_err(|e| (path.to_path_buf(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_of_known_value() {
        assert_eq!(revision_of(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(revision_of(b"A").len(), 32);
    }

    #[test]
    fn test_revision_depends_only_on_content() {
        assert_eq!(revision_of(b"same"), revision_of(b"same"));
        assert_ne!(revision_of(b"A"), revision_of(b"A2"));
    }

    #[test]
    fn test_combined_revision_matches_concatenation() {
        let temp = tempfile::tempdir().unwrap();
        let a = temp.path().join("a.html");
        let b = temp.path().join("b.css");
        fs::write(&a, "head").unwrap();
        fs::write(&b, "tail").unwrap();

        let combined = combined_revision(&[a.clone(), b.clone()]).unwrap();

        assert_eq!(combined, revision_of(b"headtail"));
        assert_eq!(combined_revision(&[b, a]).unwrap(), revision_of(b"tailhead"));
    }

    #[test]
    fn test_combined_revision_reports_missing_path() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("missing.js");

        let (path, err) = combined_revision(&[missing.clone()]).unwrap_err();

        assert_eq!(path, missing);
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
