//! Server error types.

use std::io;
use std::path::PathBuf;

use precache_manifest::GenerateError;

/// Errors that stop a dev session.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Cold generation failed.
    #[error("Service worker generation failed: {0}")]
    Generate(#[from] GenerateError),

    /// The file watcher could not be started.
    #[error("Failed to watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// A `watch.patterns` entry is not a valid glob.
    #[error("Invalid watch.patterns: {0}")]
    WatchPattern(#[source] GenerateError),

    /// The listener could not be bound.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The self-signed certificate could not be created.
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// The server stopped with an I/O error.
    #[error("Server error: {0}")]
    Io(#[from] io::Error),
}

impl From<rcgen::Error> for ServerError {
    fn from(err: rcgen::Error) -> Self {
        Self::Tls(err.to_string())
    }
}
