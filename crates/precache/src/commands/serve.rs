//! `precache serve` command implementation.

use std::path::PathBuf;

use clap::Args;
use precache_config::{CliSettings, Config};
use precache_server::{DevSession, SessionState, session_config_from_config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover precache.toml).
    #[arg(short, long)]
    pub(crate) config: Option<PathBuf>,

    /// Directory to scan, serve and watch (overrides config).
    #[arg(short, long)]
    pub(crate) root_dir: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    pub(crate) host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    pub(crate) port: Option<u16>,

    /// Serve over HTTPS with a self-signed certificate.
    #[arg(long)]
    pub(crate) https: bool,

    /// Show a banner in the browser on reload.
    #[arg(long)]
    pub(crate) notify: bool,

    /// Disable watching and live reload.
    #[arg(long)]
    pub(crate) no_watch: bool,

    /// Enable verbose output (show regeneration and request logs).
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the cold generation fails, or
    /// the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let cli_settings = self.cli_settings();
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let session_config = session_config_from_config(&config);
        let output = Output::new().with_prefix(&config.server.log_prefix);

        let dirs: Vec<_> = session_config
            .base_dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect();
        output.info(&format!("Serving files from: {}", dirs.join(", ")));
        output.info(&format!(
            "Service worker: {}",
            session_config.generator.output_path().display()
        ));
        if session_config.watch_enabled {
            output.info(&format!(
                "Watching: {}",
                session_config.watch_patterns.join(", ")
            ));
        } else {
            output.info("Live reload: disabled");
        }
        if session_config.https {
            output.warning("Using a self-signed certificate, browsers will warn on first access");
        }
        output.highlight(&format!("Local: {}", session_config.url()));

        let session = DevSession::new(session_config);
        let mut state = session.subscribe();
        let status = Output::new().with_prefix(&config.server.log_prefix);
        tokio::spawn(async move {
            while state.changed().await.is_ok() {
                let current = state.borrow_and_update().clone();
                report_state(&status, &current);
            }
        });

        session.run().await?;

        Ok(())
    }

    /// Build CLI overrides from flags; absent flags keep config values.
    fn cli_settings(&self) -> CliSettings {
        CliSettings {
            root_dir: self.root_dir.clone(),
            host: self.host.clone(),
            port: self.port,
            https: self.https.then_some(true),
            notify: self.notify.then_some(true),
            watch_enabled: self.no_watch.then_some(false),
        }
    }
}

/// How a state change line is styled.
#[derive(Debug, PartialEq, Eq)]
enum Tone {
    Info,
    Success,
    Warning,
}

/// Line printed for a regeneration state change.
fn state_line(state: &SessionState) -> (Tone, String) {
    match state {
        SessionState::Regenerating => (Tone::Info, "Regenerating service worker".to_owned()),
        SessionState::Idle { last_error: None } => (
            Tone::Success,
            "Service worker up to date, reloading browsers".to_owned(),
        ),
        SessionState::Idle {
            last_error: Some(error),
        } => (
            Tone::Warning,
            format!("Service worker regeneration failed, keeping previous version: {error}"),
        ),
    }
}

fn report_state(status: &Output, state: &SessionState) {
    match state_line(state) {
        (Tone::Info, line) => status.info(&line),
        (Tone::Success, line) => status.success(&line),
        (Tone::Warning, line) => status.warning(&line),
    }
}
