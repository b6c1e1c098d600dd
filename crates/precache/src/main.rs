//! precache CLI - service worker precache generator.
//!
//! Provides commands for:
//! - `generate-service-worker`: Write the precache service worker
//! - `serve`: Generate, serve with live reload, regenerate on change

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{GenerateArgs, ServeArgs};
use error::CliError;
use output::Output;

/// precache - service worker precache generator and dev server.
#[derive(Parser, Debug)]
#[command(name = "precache", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate the service worker precache manifest.
    GenerateServiceWorker(GenerateArgs),
    /// Generate, then serve with live reload.
    Serve(ServeArgs),
}

impl Commands {
    fn verbose(&self) -> bool {
        match self {
            Self::GenerateServiceWorker(args) => args.verbose,
            Self::Serve(args) => args.verbose,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.command.verbose()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli) {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

/// `--verbose` enables INFO level (one line per cached file), otherwise use
/// `RUST_LOG` or default to WARN.
fn log_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::GenerateServiceWorker(args) => args.execute(),
        Commands::Serve(args) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(args.execute())
        }
    }
}
