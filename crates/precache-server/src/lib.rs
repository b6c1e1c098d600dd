//! Development server with live reload for precache.
//!
//! A [`DevSession`] generates the service worker once, then serves the site
//! and keeps the worker in sync with the files it precaches:
//! - Static files from one or more base directories
//! - A live-reload script injected into HTML pages at a marker
//! - A WebSocket that tells browsers to reload after each regeneration
//!
//! # Quick Start
//!
//! ```ignore
//! use precache_server::{DevSession, session_config_from_config};
//!
//! let config = precache_config::Config::load(None, None)?;
//! let session = DevSession::new(session_config_from_config(&config));
//! session.run().await?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! notify ──► ChangeDebouncer ──► regenerate (blocking thread) ──► sw.js
//!                                      │
//!                                      └─► broadcast ──► WebSocket clients
//!
//! Browser ──HTTP──► axum router
//!                        ├─► /__precache/ws            (live reload)
//!                        ├─► /__precache/live-reload.js
//!                        └─► static files (+ snippet injection)
//! ```

mod app;
mod error;
mod live_reload;
mod middleware;
mod session;
mod snippet;
mod state;
mod static_files;
mod tls;

use std::path::PathBuf;
use std::time::Duration;

use precache_manifest::GeneratorConfig;

pub use error::ServerError;
pub use session::{DevSession, SessionState};

/// Dev session configuration.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Generator run on startup and after every change.
    pub generator: GeneratorConfig,
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Serve over HTTPS with a self-signed certificate.
    pub https: bool,
    /// Directories to serve, first hit wins.
    pub base_dirs: Vec<PathBuf>,
    /// Marker in HTML pages replaced by the live-reload script tag.
    pub snippet_match: String,
    /// Show an in-browser banner on reload.
    pub notify: bool,
    /// Watch files and reload browsers.
    pub watch_enabled: bool,
    /// Root-relative patterns that trigger regeneration.
    pub watch_patterns: Vec<String>,
    /// Quiet period before a change is acted upon.
    pub debounce: Duration,
}

impl SessionConfig {
    /// URL the server will be reachable at.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.https { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

/// Build generator options from the loaded configuration.
#[must_use]
pub fn generator_config(config: &precache_config::Config) -> GeneratorConfig {
    let resolved = &config.generator_resolved;
    let mut generator = GeneratorConfig::new(
        resolved.root_dir.clone(),
        resolved.static_file_globs.clone(),
    );

    generator.output.clone_from(&resolved.output);
    generator.strip_prefix.clone_from(&resolved.strip_prefix);
    generator.replace_prefix.clone_from(&resolved.replace_prefix);
    generator.cache_id.clone_from(&resolved.cache_id);
    generator.maximum_file_size_to_cache_in_bytes = resolved.maximum_file_size_to_cache_in_bytes;
    generator.directory_index.clone_from(&resolved.directory_index);
    generator.navigate_fallback.clone_from(&resolved.navigate_fallback);
    generator
        .ignore_url_parameters_matching
        .clone_from(&resolved.ignore_url_parameters_matching);
    generator.handle_fetch = resolved.handle_fetch;
    generator
        .dynamic_url_to_dependencies
        .clone_from(&resolved.dynamic_url_to_dependencies);

    generator
}

/// Create dev session configuration from the loaded configuration.
#[must_use]
pub fn session_config_from_config(config: &precache_config::Config) -> SessionConfig {
    SessionConfig {
        generator: generator_config(config),
        host: config.server.host.clone(),
        port: config.server.port,
        https: config.server.https,
        base_dirs: config.base_dirs_resolved.clone(),
        snippet_match: config.server.snippet.match_marker.clone(),
        notify: config.server.notify,
        watch_enabled: config.watch.enabled,
        watch_patterns: config.watch.patterns.clone(),
        debounce: Duration::from_millis(config.watch.debounce_ms),
    }
}
