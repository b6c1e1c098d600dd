//! Dev session supervisor.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use precache_manifest::{ManifestGenerator, PatternSet};
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::error::ServerError;
use crate::live_reload::LiveReloadManager;
use crate::state::AppState;
use crate::{SessionConfig, app, tls};

/// Regeneration state of a running session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for changes. `last_error` is set when the most recent
    /// regeneration failed and the previous worker script is still in place.
    Idle { last_error: Option<String> },
    /// The generator is running.
    Regenerating,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle { last_error: None }
    }
}

/// Generates the worker, serves the site, and regenerates on change.
pub struct DevSession {
    config: SessionConfig,
    state: watch::Sender<SessionState>,
}

impl DevSession {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self { config, state }
    }

    /// Observe regeneration state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Run until Ctrl-C.
    ///
    /// Steps run in order: cold generation, bind, watch, serve. A failure in
    /// any of them ends the session before the next one starts.
    ///
    /// # Errors
    ///
    /// Returns an error if cold generation fails, the address cannot be
    /// bound, the watcher cannot start, or the server stops abnormally.
    pub async fn run(self) -> Result<(), ServerError> {
        let Self { config, state } = self;

        let cold = ManifestGenerator::new(config.generator.clone());
        tokio::task::spawn_blocking(move || cold.generate())
            .await
            .map_err(std::io::Error::other)??;

        // Watcher events carry canonical paths
        let mut generator_config = config.generator.clone();
        generator_config.root_dir = tokio::fs::canonicalize(&generator_config.root_dir).await?;
        let generator = Arc::new(ManifestGenerator::new(generator_config));

        let listener = bind(&config.host, config.port).await?;
        let address = listener.local_addr()?;

        let live_reload = if config.watch_enabled {
            let patterns =
                PatternSet::new(&config.watch_patterns).map_err(ServerError::WatchPattern)?;
            let mut manager =
                LiveReloadManager::new(patterns, generator, state.clone(), config.debounce);
            manager.start()?;
            Some(manager)
        } else {
            None
        };

        let app_state = Arc::new(AppState::new(
            config.base_dirs.clone(),
            &config.snippet_match,
            config.notify,
            live_reload,
        ));
        let router = app::create_router(app_state);

        if config.https {
            let rustls_config = tls::self_signed_config(&config.host).await?;
            tracing::info!(address = %address, "Starting HTTPS server");

            let handle = axum_server::Handle::new();
            let shutdown = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown.graceful_shutdown(Some(Duration::from_secs(1)));
            });

            axum_server::from_tcp_rustls(listener.into_std()?, rustls_config)
                .handle(handle)
                .serve(router.into_make_service())
                .await?;
        } else {
            tracing::info!(address = %address, "Starting server");
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }

        Ok(())
    }
}

/// Resolve `host` and bind the first address it yields.
async fn bind(host: &str, port: u16) -> Result<TcpListener, ServerError> {
    let address = format!("{host}:{port}");
    let bind_error = |source| ServerError::Bind {
        address: address.clone(),
        source,
    };

    let resolved: SocketAddr = tokio::net::lookup_host((host, port))
        .await
        .map_err(bind_error)?
        .next()
        .ok_or_else(|| {
            bind_error(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "host resolved to no addresses",
            ))
        })?;

    TcpListener::bind(resolved).await.map_err(bind_error)
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}
