//! Error types for manifest generation.

use std::path::{Path, PathBuf};

/// Error that aborts a generation run.
///
/// None of these variants leave a partially written output file behind.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// Root directory does not exist or is not a directory.
    #[error("Root directory not found: {}", .0.display())]
    NotFound(PathBuf),
    /// No static file globs were configured.
    #[error("At least one static file glob is required")]
    EmptyPatternSet,
    /// A glob pattern is syntactically invalid.
    #[error("Invalid glob pattern `{pattern}`: {message}")]
    GlobExpansion {
        /// Pattern as configured (before brace expansion).
        pattern: String,
        /// Parser message.
        message: String,
    },
    /// Manifest could not be serialized for embedding.
    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),
    /// Worker template failed to render.
    #[error("Failed to render service worker template: {0}")]
    Template(#[from] minijinja::Error),
    /// Output file could not be written.
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        /// Output path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// A matched file that was left out of the manifest.
///
/// Skipped files never abort a run; they are reported alongside the
/// manifest so callers can surface them as warnings.
#[derive(Debug, thiserror::Error)]
pub enum SkippedFile {
    /// The file (or a directory on the way to it) could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file exceeds the configured size limit.
    #[error(
        "Skipping {} ({size} bytes): larger than the {limit} byte precache limit",
        path.display()
    )]
    TooLarge {
        /// Path of the oversized file.
        path: PathBuf,
        /// File size in bytes.
        size: u64,
        /// Configured limit in bytes.
        limit: u64,
    },
}

impl SkippedFile {
    /// Path of the skipped file.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Read { path, .. } | Self::TooLarge { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_includes_path() {
        let err = GenerateError::NotFound(PathBuf::from("/srv/site"));
        assert_eq!(err.to_string(), "Root directory not found: /srv/site");
    }

    #[test]
    fn test_skipped_file_path() {
        let skipped = SkippedFile::TooLarge {
            path: PathBuf::from("video.mp4"),
            size: 10,
            limit: 5,
        };
        assert_eq!(skipped.path(), Path::new("video.mp4"));
        assert!(skipped.to_string().contains("5 byte"));
    }
}
