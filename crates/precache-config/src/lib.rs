//! Configuration management for precache.
//!
//! Parses `precache.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `server.host`
//! - `generator.root_dir`
//! - `generator.cache_id`
//!
//! ## Example
//!
//! ```toml
//! [generator]
//! root_dir = "."
//! static_file_globs = ["index.html", "style.css", "elm.js"]
//!
//! [server]
//! port = 5000
//! notify = false
//!
//! [watch]
//! patterns = ["public/**/*.{js,html,css,png,jpg,gif}"]
//! ```

mod expand;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override generator root directory.
    pub root_dir: Option<PathBuf>,
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override HTTPS flag.
    pub https: Option<bool>,
    /// Override reload notification banner flag.
    pub notify: Option<bool>,
    /// Override watch enabled flag.
    pub watch_enabled: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "precache.toml";

/// Default snippet placeholder, as used by existing pages.
pub const DEFAULT_SNIPPET_MATCH: &str = r#"<span id="browser-sync-binding"></span>"#;

/// Default per-file precache limit (2 MiB).
const DEFAULT_MAXIMUM_FILE_SIZE: u64 = 2 * 1024 * 1024;

/// Default files to precache.
fn default_static_file_globs() -> Vec<String> {
    [
        "index.html",
        "style.css",
        "elm.js",
        "service-worker-registration.js",
    ]
    .map(str::to_owned)
    .to_vec()
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Generator configuration (paths are relative strings from TOML).
    generator: GeneratorConfigRaw,
    /// Dev server configuration.
    pub server: ServerConfig,
    /// Watch configuration.
    pub watch: WatchConfig,

    /// Resolved generator configuration (set after loading).
    #[serde(skip)]
    pub generator_resolved: GeneratorConfig,
    /// Resolved directories served by the dev server (set after loading).
    #[serde(skip)]
    pub base_dirs_resolved: Vec<PathBuf>,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw generator configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct GeneratorConfigRaw {
    root_dir: Option<String>,
    static_file_globs: Option<Vec<String>>,
    output: Option<String>,
    strip_prefix: Option<String>,
    replace_prefix: Option<String>,
    cache_id: Option<String>,
    maximum_file_size_to_cache_in_bytes: Option<u64>,
    directory_index: Option<String>,
    navigate_fallback: Option<String>,
    ignore_url_parameters_matching: Option<Vec<String>>,
    handle_fetch: Option<bool>,
    dynamic_url_to_dependencies: BTreeMap<String, Vec<String>>,
}

/// Resolved generator configuration with absolute paths.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Base for globs and public path stripping.
    pub root_dir: PathBuf,
    /// Files to precache.
    pub static_file_globs: Vec<String>,
    /// Output script, relative to `root_dir`.
    pub output: PathBuf,
    /// Extra prefix removed from each public path.
    pub strip_prefix: Option<String>,
    /// Prefix prepended to each public path.
    pub replace_prefix: String,
    /// Cache name discriminator.
    pub cache_id: String,
    /// Per-file size limit in bytes.
    pub maximum_file_size_to_cache_in_bytes: u64,
    /// Directory index file (`None` disables the mapping).
    pub directory_index: Option<String>,
    /// Navigation fallback URL.
    pub navigate_fallback: Option<String>,
    /// Query parameter patterns ignored by the worker.
    pub ignore_url_parameters_matching: Vec<String>,
    /// Whether the worker handles fetches.
    pub handle_fetch: bool,
    /// Dynamic URLs and the root-relative files they depend on.
    pub dynamic_url_to_dependencies: BTreeMap<String, Vec<PathBuf>>,
}

impl GeneratorConfig {
    fn with_root(root_dir: PathBuf) -> Self {
        Self {
            root_dir,
            static_file_globs: default_static_file_globs(),
            output: PathBuf::from("sw.js"),
            strip_prefix: None,
            replace_prefix: String::new(),
            cache_id: String::new(),
            maximum_file_size_to_cache_in_bytes: DEFAULT_MAXIMUM_FILE_SIZE,
            directory_index: Some("index.html".to_owned()),
            navigate_fallback: None,
            ignore_url_parameters_matching: vec!["^utm_".to_owned()],
            handle_fetch: true,
            dynamic_url_to_dependencies: BTreeMap::new(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::with_root(PathBuf::from("."))
    }
}

/// Dev server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Serve over HTTPS with a self-signed certificate.
    pub https: bool,
    /// Show an in-browser banner on reload.
    pub notify: bool,
    /// Prefix for console status lines.
    pub log_prefix: String,
    /// Directories to serve, in lookup order (default: generator root).
    pub base_dirs: Option<Vec<String>>,
    /// Live-reload snippet injection.
    pub snippet: SnippetConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 5000,
            https: false,
            notify: false,
            log_prefix: "PSK".to_owned(),
            base_dirs: None,
            snippet: SnippetConfig::default(),
        }
    }
}

/// Snippet injection configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SnippetConfig {
    /// Literal marker in served HTML that is replaced by the reload script tag.
    #[serde(rename = "match")]
    pub match_marker: String,
}

impl Default for SnippetConfig {
    fn default() -> Self {
        Self {
            match_marker: DEFAULT_SNIPPET_MATCH.to_owned(),
        }
    }
}

/// Watch configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Whether to watch, regenerate and reload.
    pub enabled: bool,
    /// Patterns, relative to the generator root, that trigger regeneration.
    pub patterns: Vec<String>,
    /// Debounce window in milliseconds.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            patterns: vec!["public/**/*.{js,html,css,png,jpg,gif}".to_owned()],
            debounce_ms: 100,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`server.host`").
        field: String,
        /// Error message (e.g., "${`PRECACHE_HOST`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Resolve a configured path against the config directory.
fn resolve_path(config_dir: &Path, path: &str) -> PathBuf {
    if path == "." || path == "./" {
        config_dir.to_path_buf()
    } else {
        config_dir.join(path)
    }
}

/// Directory a config file's relative paths are resolved against.
///
/// A bare file name has an empty parent, which means the current directory.
fn config_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `precache.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(root_dir) = &settings.root_dir {
            self.generator_resolved.root_dir.clone_from(root_dir);
            if self.server.base_dirs.is_none() {
                self.base_dirs_resolved = vec![root_dir.clone()];
            }
        }
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(https) = settings.https {
            self.server.https = https;
        }
        if let Some(notify) = settings.notify {
            self.server.notify = notify;
        }
        if let Some(watch_enabled) = settings.watch_enabled {
            self.watch.enabled = watch_enabled;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            generator: GeneratorConfigRaw::default(),
            server: ServerConfig::default(),
            watch: WatchConfig::default(),
            generator_resolved: GeneratorConfig::with_root(base.to_path_buf()),
            base_dirs_resolved: vec![base.to_path_buf()],
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        config.resolve_paths(config_dir(path));
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_generator()?;
        self.validate_server()?;
        self.validate_watch()?;
        Ok(())
    }

    fn validate_generator(&self) -> Result<(), ConfigError> {
        let generator = &self.generator_resolved;

        if generator.static_file_globs.is_empty() {
            return Err(ConfigError::Validation(
                "generator.static_file_globs must contain at least one pattern".to_owned(),
            ));
        }
        if generator.static_file_globs.iter().any(String::is_empty) {
            return Err(ConfigError::Validation(
                "generator.static_file_globs cannot contain empty patterns".to_owned(),
            ));
        }
        if generator.output.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "generator.output cannot be empty".to_owned(),
            ));
        }
        if generator.maximum_file_size_to_cache_in_bytes == 0 {
            return Err(ConfigError::Validation(
                "generator.maximum_file_size_to_cache_in_bytes must be greater than 0".to_owned(),
            ));
        }

        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        // Port 0 is technically valid (OS assigns a random port), but it's
        // unlikely to be intentional in a config file
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        require_non_empty(&self.server.snippet.match_marker, "server.snippet.match")?;

        if self.base_dirs_resolved.is_empty() {
            return Err(ConfigError::Validation(
                "server.base_dirs must contain at least one directory".to_owned(),
            ));
        }

        Ok(())
    }

    fn validate_watch(&self) -> Result<(), ConfigError> {
        const MAX_DEBOUNCE_MS: u64 = 10_000;

        if self.watch.enabled && self.watch.patterns.is_empty() {
            return Err(ConfigError::Validation(
                "watch.patterns must contain at least one pattern when watching is enabled"
                    .to_owned(),
            ));
        }
        if self.watch.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Validation(format!(
                "watch.debounce_ms cannot exceed {MAX_DEBOUNCE_MS}"
            )));
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;

        if let Some(ref root_dir) = self.generator.root_dir {
            self.generator.root_dir = Some(expand::expand_env(root_dir, "generator.root_dir")?);
        }
        if let Some(ref cache_id) = self.generator.cache_id {
            self.generator.cache_id = Some(expand::expand_env(cache_id, "generator.cache_id")?);
        }

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let raw = &self.generator;
        let root_dir = resolve_path(config_dir, raw.root_dir.as_deref().unwrap_or("."));
        let defaults = GeneratorConfig::with_root(root_dir.clone());

        let directory_index = match raw.directory_index.as_deref() {
            Some("") => None,
            Some(index) => Some(index.to_owned()),
            None => defaults.directory_index,
        };

        let dynamic_url_to_dependencies = raw
            .dynamic_url_to_dependencies
            .iter()
            .map(|(url, deps)| (url.clone(), deps.iter().map(PathBuf::from).collect()))
            .collect();

        self.generator_resolved = GeneratorConfig {
            root_dir: root_dir.clone(),
            static_file_globs: raw
                .static_file_globs
                .clone()
                .unwrap_or(defaults.static_file_globs),
            output: raw.output.as_deref().map_or(defaults.output, PathBuf::from),
            strip_prefix: raw.strip_prefix.clone(),
            replace_prefix: raw.replace_prefix.clone().unwrap_or_default(),
            cache_id: raw.cache_id.clone().unwrap_or_default(),
            maximum_file_size_to_cache_in_bytes: raw
                .maximum_file_size_to_cache_in_bytes
                .unwrap_or(defaults.maximum_file_size_to_cache_in_bytes),
            directory_index,
            navigate_fallback: raw.navigate_fallback.clone(),
            ignore_url_parameters_matching: raw
                .ignore_url_parameters_matching
                .clone()
                .unwrap_or(defaults.ignore_url_parameters_matching),
            handle_fetch: raw.handle_fetch.unwrap_or(defaults.handle_fetch),
            dynamic_url_to_dependencies,
        };

        self.base_dirs_resolved = match &self.server.base_dirs {
            Some(dirs) => dirs.iter().map(|d| resolve_path(config_dir, d)).collect(),
            None => vec![root_dir],
        };
    }
}
