//! Application state.
//!
//! Shared state for all request handlers.

use std::path::PathBuf;

use crate::live_reload::{LiveReloadManager, client_script};
use crate::snippet::Snippet;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Directories searched in order for each request.
    pub(crate) base_dirs: Vec<PathBuf>,
    /// Script tag injection for HTML pages.
    pub(crate) snippet: Snippet,
    /// Live reload client, rendered once.
    pub(crate) client_script: String,
    /// Live reload manager (if enabled).
    pub(crate) live_reload: Option<LiveReloadManager>,
}

impl AppState {
    pub(crate) fn new(
        base_dirs: Vec<PathBuf>,
        snippet_match: &str,
        notify: bool,
        live_reload: Option<LiveReloadManager>,
    ) -> Self {
        Self {
            base_dirs,
            snippet: Snippet::new(snippet_match),
            client_script: client_script(notify),
            live_reload,
        }
    }

    /// Check if live reload is enabled.
    #[must_use]
    pub(crate) fn live_reload_enabled(&self) -> bool {
        self.live_reload.is_some()
    }
}
