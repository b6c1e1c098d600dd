//! `precache generate-service-worker` command implementation.

use std::path::PathBuf;

use clap::Args;
use precache_config::{CliSettings, Config};
use precache_manifest::ManifestGenerator;
use precache_server::generator_config;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the generate-service-worker command.
#[derive(Args, Debug)]
pub(crate) struct GenerateArgs {
    /// Path to configuration file (default: auto-discover precache.toml).
    #[arg(short, long)]
    pub(crate) config: Option<PathBuf>,

    /// Directory to scan and write the worker into (overrides config).
    #[arg(short, long)]
    pub(crate) root_dir: Option<PathBuf>,

    /// Enable verbose output (list every cached file).
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

impl GenerateArgs {
    /// Execute the generate-service-worker command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the worker cannot be
    /// generated.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            root_dir: self.root_dir,
            ..CliSettings::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let generator = ManifestGenerator::new(generator_config(&config));
        let generation = generator.generate()?;

        if !generation.skipped.is_empty() {
            output.warning(&format!(
                "{} matched file(s) left out of the precache manifest",
                generation.skipped.len()
            ));
        }
        output.success(&format!(
            "Wrote {} ({} resources)",
            generation.output_path.display(),
            generation.manifest.len()
        ));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_execute_writes_worker_from_config() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("index.html"), "<html>").unwrap();
        fs::write(
            temp.path().join("precache.toml"),
            "[generator]\nstatic_file_globs = [\"*.html\"]\n",
        )
        .unwrap();

        let args = GenerateArgs {
            config: Some(temp.path().join("precache.toml")),
            root_dir: None,
            verbose: false,
        };
        args.execute().unwrap();

        let script = fs::read_to_string(temp.path().join("sw.js")).unwrap();
        assert!(script.contains(r#"["index.html","#));
    }

    #[test]
    fn test_execute_missing_root_fails() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("precache.toml"), "").unwrap();

        let args = GenerateArgs {
            config: Some(temp.path().join("precache.toml")),
            root_dir: Some(temp.path().join("missing")),
            verbose: false,
        };

        assert!(matches!(
            args.execute(),
            Err(CliError::Generate(precache_manifest::GenerateError::NotFound(_)))
        ));
    }
}
