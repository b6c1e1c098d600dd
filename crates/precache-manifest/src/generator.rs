//! Manifest generation runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GenerateError, SkippedFile};
use crate::manifest::{Manifest, PathRewrite};
use crate::pattern::PatternSet;
use crate::revision::{combined_revision, revision_of};
use crate::template::render_service_worker;

/// Default output file name, relative to the root directory.
pub const DEFAULT_OUTPUT: &str = "sw.js";

/// Default per-file precache limit (2 MiB).
pub const DEFAULT_MAXIMUM_FILE_SIZE: u64 = 2 * 1024 * 1024;

/// Generator configuration.
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    /// Base for globs and for stripping the public path prefix.
    pub root_dir: PathBuf,
    /// Glob patterns selecting the files to precache.
    pub static_file_globs: Vec<String>,
    /// Output script path, relative to `root_dir` unless absolute.
    pub output: PathBuf,
    /// Extra prefix removed from each root-relative path.
    pub strip_prefix: Option<String>,
    /// Prefix prepended after stripping.
    pub replace_prefix: String,
    /// Distinguishes caches of several apps on one origin.
    pub cache_id: String,
    /// Files larger than this are skipped.
    pub maximum_file_size_to_cache_in_bytes: u64,
    /// File served for directory URLs.
    pub directory_index: Option<String>,
    /// URL served for navigations that miss the cache.
    pub navigate_fallback: Option<String>,
    /// Query parameter names (as regular expressions) ignored on lookup.
    pub ignore_url_parameters_matching: Vec<String>,
    /// Whether the worker answers fetches from the cache.
    pub handle_fetch: bool,
    /// URLs whose revision is derived from a list of root-relative files.
    pub dynamic_url_to_dependencies: BTreeMap<String, Vec<PathBuf>>,
}

impl GeneratorConfig {
    /// Create a configuration with default options.
    #[must_use]
    pub fn new(root_dir: impl Into<PathBuf>, static_file_globs: Vec<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            static_file_globs,
            output: PathBuf::from(DEFAULT_OUTPUT),
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

    /// Resolved output path.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.root_dir.join(&self.output)
    }
}

/// Result of a generation run.
#[derive(Debug)]
pub struct Generation {
    /// Resources that made it into the worker.
    pub manifest: Manifest,
    /// Matched files that were left out, with the reason.
    pub skipped: Vec<SkippedFile>,
    /// Sum of the sizes of all precached files, in bytes.
    pub total_size: u64,
    /// Where the worker script is (or would be) written.
    pub output_path: PathBuf,
}

/// Derives the precache manifest from the filesystem and writes the worker.
///
/// A generator holds no state between runs: every call rescans the tree and
/// rehashes every matched file.
#[derive(Clone, Debug)]
pub struct ManifestGenerator {
    config: GeneratorConfig,
}

impl ManifestGenerator {
    #[must_use]
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Compute the manifest without writing anything.
    ///
    /// # Errors
    ///
    /// Fails before touching any file if the pattern set is empty or
    /// malformed, or if the root directory does not exist.
    pub fn build(&self) -> Result<Generation, GenerateError> {
        let config = &self.config;
        let root = config.root_dir.as_path();

        if config.static_file_globs.is_empty() {
            return Err(GenerateError::EmptyPatternSet);
        }
        let patterns = PatternSet::new(&config.static_file_globs)?;

        if !root.is_dir() {
            return Err(GenerateError::NotFound(root.to_path_buf()));
        }
        // Glob results drop `./` components, so match against an absolute root
        let root =
            std::path::absolute(root).map_err(|_| GenerateError::NotFound(root.to_path_buf()))?;
        let root = root.as_path();

        let output_path = root.join(&config.output);
        let output_relative = output_path.strip_prefix(root).ok().map(Path::to_path_buf);
        let rewrite = PathRewrite::new(config.strip_prefix.as_deref(), &config.replace_prefix);

        let (files, mut skipped) = patterns.expand(root)?;
        let mut manifest = Manifest::new();
        let mut total_size = 0u64;

        for path in files {
            let Ok(relative) = path.strip_prefix(root) else {
                tracing::warn!(
                    path = %path.display(),
                    root = %root.display(),
                    "Matched path is outside the root directory"
                );
                continue;
            };
            if output_relative.as_deref() == Some(relative) {
                continue;
            }

            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(source) => {
                    skip(&mut skipped, SkippedFile::Read { path, source });
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let size = metadata.len();
            let limit = config.maximum_file_size_to_cache_in_bytes;
            if size > limit {
                skip(&mut skipped, SkippedFile::TooLarge { path, size, limit });
                continue;
            }

            let content = match fs::read(&path) {
                Ok(content) => content,
                Err(source) => {
                    skip(&mut skipped, SkippedFile::Read { path, source });
                    continue;
                }
            };

            let public_path = rewrite.public_path(relative);
            tracing::info!(path = %public_path, size = content.len(), "Caching static resource");
            total_size += content.len() as u64;
            manifest.insert(public_path, revision_of(&content));
        }

        for (url, dependencies) in &config.dynamic_url_to_dependencies {
            let paths: Vec<_> = dependencies.iter().map(|d| root.join(d)).collect();
            match combined_revision(&paths) {
                Ok(revision) => {
                    tracing::info!(url = %url, dependencies = paths.len(), "Caching dynamic URL");
                    manifest.insert(url.clone(), revision);
                }
                Err((path, source)) => skip(&mut skipped, SkippedFile::Read { path, source }),
            }
        }

        tracing::info!(
            resources = manifest.len(),
            total_size,
            "Total precache size is about {} for {} resources",
            format_size(total_size),
            manifest.len()
        );

        Ok(Generation {
            manifest,
            skipped,
            total_size,
            output_path,
        })
    }

    /// Render the worker script for a manifest.
    pub fn render(&self, manifest: &Manifest) -> Result<String, GenerateError> {
        render_service_worker(manifest, &self.config)
    }

    /// Compute the manifest and write the worker script, replacing any
    /// previous output wholesale.
    ///
    /// # Errors
    ///
    /// See [`build`](Self::build); also fails if the output cannot be written.
    pub fn generate(&self) -> Result<Generation, GenerateError> {
        let generation = self.build()?;
        let script = self.render(&generation.manifest)?;
        write_replacing(&generation.output_path, script.as_bytes())?;

        tracing::info!(
            output = %generation.output_path.display(),
            resources = generation.manifest.len(),
            skipped = generation.skipped.len(),
            "Wrote service worker"
        );

        Ok(generation)
    }
}

fn skip(skipped: &mut Vec<SkippedFile>, file: SkippedFile) {
    tracing::warn!("{file}");
    skipped.push(file);
}

/// Write through a sibling temp file so readers never see a partial script.
fn write_replacing(path: &Path, content: &[u8]) -> Result<(), GenerateError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let to_error = |source| GenerateError::Write {
        path: path.to_path_buf(),
        source,
    };

    fs::write(&tmp, content).map_err(to_error)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        to_error(e)
    })
}

/// Human-readable byte size.
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "kB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;

    use super::*;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn generator(root: &Path, globs: &[&str]) -> ManifestGenerator {
        let globs = globs.iter().map(|g| (*g).to_owned()).collect();
        ManifestGenerator::new(GeneratorConfig::new(root, globs))
    }

    fn paths(manifest: &Manifest) -> Vec<&str> {
        manifest.iter().map(|(p, _)| p).collect()
    }

    #[test]
    fn test_build_matches_exactly_the_globbed_files() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.html", "<html>");
        write(temp.path(), "style.css", "body {}");
        write(temp.path(), "public/app.js", "app");
        write(temp.path(), "public/img/logo.png", "png");
        write(temp.path(), "public/notes.txt", "txt");
        write(temp.path(), "README.md", "readme");

        let generation = generator(
            temp.path(),
            &["index.html", "style.css", "public/**/*.{js,png}"],
        )
        .build()
        .unwrap();

        assert_eq!(
            paths(&generation.manifest),
            vec!["index.html", "public/app.js", "public/img/logo.png", "style.css"]
        );
        assert_eq!(generation.total_size, 6 + 7 + 3 + 3);
        assert!(generation.skipped.is_empty());
    }

    #[test]
    fn test_build_ignores_directories() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("assets.js")).unwrap();
        write(temp.path(), "main.js", "main");

        let generation = generator(temp.path(), &["*.js"]).build().unwrap();

        assert_eq!(paths(&generation.manifest), vec!["main.js"]);
    }

    #[test]
    fn test_empty_match_set_is_not_an_error() {
        let temp = tempfile::tempdir().unwrap();

        let generation = generator(temp.path(), &["*.html"]).generate().unwrap();

        assert!(generation.manifest.is_empty());
        let script = fs::read_to_string(temp.path().join("sw.js")).unwrap();
        assert!(script.contains("var precacheConfig = [];"));
    }

    #[test]
    fn test_empty_pattern_set_is_rejected() {
        let temp = tempfile::tempdir().unwrap();

        let err = generator(temp.path(), &[]).generate().unwrap_err();

        assert!(matches!(err, GenerateError::EmptyPatternSet));
        assert!(!temp.path().join("sw.js").exists());
    }

    #[test]
    fn test_missing_root_keeps_previous_output() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("site");
        let mut config = GeneratorConfig::new(&root, vec!["*.html".to_owned()]);
        config.output = temp.path().join("sw.js");
        write(temp.path(), "sw.js", "previous");

        let err = ManifestGenerator::new(config).generate().unwrap_err();

        assert!(matches!(err, GenerateError::NotFound(_)));
        assert_eq!(
            fs::read_to_string(temp.path().join("sw.js")).unwrap(),
            "previous"
        );
    }

    #[test]
    fn test_invalid_glob_fails_before_writing() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.html", "x");

        let err = generator(temp.path(), &["index.html", "[oops"])
            .generate()
            .unwrap_err();

        assert!(matches!(err, GenerateError::GlobExpansion { .. }));
        assert!(!temp.path().join("sw.js").exists());
    }

    #[test]
    fn test_generate_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.html", "A");
        write(temp.path(), "style.css", "B");
        let generator = generator(temp.path(), &["*.{html,css}"]);

        generator.generate().unwrap();
        let first = fs::read(temp.path().join("sw.js")).unwrap();
        generator.generate().unwrap();
        let second = fs::read(temp.path().join("sw.js")).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_content_change_only_changes_that_token() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "a.js", "a");
        write(temp.path(), "b.js", "b");
        write(temp.path(), "c.js", "c");
        let generator = generator(temp.path(), &["*.js"]);

        let before = generator.build().unwrap().manifest;
        write(temp.path(), "b.js", "b changed");
        let after = generator.build().unwrap().manifest;

        assert_eq!(before.get("a.js"), after.get("a.js"));
        assert_eq!(before.get("c.js"), after.get("c.js"));
        assert_ne!(before.get("b.js"), after.get("b.js"));
    }

    #[test]
    fn test_output_file_is_never_precached() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "app.js", "app");
        let generator = generator(temp.path(), &["*.js"]);

        generator.generate().unwrap();
        let generation = generator.generate().unwrap();

        assert_eq!(paths(&generation.manifest), vec!["app.js"]);
        assert!(!temp.path().join("sw.js.tmp").exists());
    }

    #[test]
    fn test_oversized_files_are_skipped() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "small.js", "12345");
        write(temp.path(), "large.js", "1234567890");
        let mut config = GeneratorConfig::new(temp.path(), vec!["*.js".to_owned()]);
        config.maximum_file_size_to_cache_in_bytes = 5;

        let generation = ManifestGenerator::new(config).build().unwrap();

        assert_eq!(paths(&generation.manifest), vec!["small.js"]);
        assert_eq!(generation.skipped.len(), 1);
        assert!(matches!(
            generation.skipped[0],
            SkippedFile::TooLarge { size: 10, limit: 5, .. }
        ));
    }

    #[test]
    fn test_strip_and_replace_prefix() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "public/app.js", "app");
        let mut config = GeneratorConfig::new(temp.path(), vec!["public/*.js".to_owned()]);
        config.strip_prefix = Some("public/".to_owned());
        config.replace_prefix = "/assets/".to_owned();

        let generation = ManifestGenerator::new(config).build().unwrap();

        assert_eq!(paths(&generation.manifest), vec!["/assets/app.js"]);
    }

    #[test]
    fn test_dynamic_urls_hash_their_dependencies() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "shell.html", "shell");
        write(temp.path(), "style.css", "css");
        let mut config = GeneratorConfig::new(temp.path(), vec!["*.css".to_owned()]);
        config.dynamic_url_to_dependencies.insert(
            "/app-shell".to_owned(),
            vec![PathBuf::from("shell.html"), PathBuf::from("style.css")],
        );

        let generation = ManifestGenerator::new(config).build().unwrap();

        assert_eq!(
            generation.manifest.get("/app-shell"),
            Some(revision_of(b"shellcss").as_str())
        );
        assert_eq!(generation.manifest.len(), 2);
    }

    #[test]
    fn test_unreadable_dependency_is_skipped_with_warning() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.html", "x");
        let mut config = GeneratorConfig::new(temp.path(), vec!["*.html".to_owned()]);
        config
            .dynamic_url_to_dependencies
            .insert("/shell".to_owned(), vec![PathBuf::from("missing.html")]);

        let generation = ManifestGenerator::new(config).build().unwrap();

        assert_eq!(paths(&generation.manifest), vec!["index.html"]);
        assert_eq!(generation.skipped.len(), 1);
        assert!(matches!(generation.skipped[0], SkippedFile::Read { .. }));
        assert_eq!(
            generation.skipped[0].path(),
            temp.path().join("missing.html")
        );
    }

    #[test]
    fn test_relative_root_with_dot_slash() {
        // Relative to the working directory, so the root starts with `./`
        let temp = tempfile::Builder::new()
            .prefix("precache-relative-root")
            .tempdir_in(".")
            .unwrap();
        assert!(temp.path().starts_with("."));
        write(temp.path(), "index.html", "A");
        write(temp.path(), "style.css", "B");
        let generator = generator(temp.path(), &["./index.html", "./style.css"]);

        let before = generator.generate().unwrap().manifest;
        write(temp.path(), "index.html", "A2");
        let after = generator.generate().unwrap().manifest;

        assert_eq!(paths(&before), vec!["index.html", "style.css"]);
        assert_eq!(before.get("index.html"), Some(revision_of(b"A").as_str()));
        assert_eq!(before.get("style.css"), Some(revision_of(b"B").as_str()));
        assert_eq!(after.get("index.html"), Some(revision_of(b"A2").as_str()));
        assert_eq!(before.get("style.css"), after.get("style.css"));
        assert!(temp.path().join("sw.js").exists());
    }

    #[test]
    fn test_hidden_files_are_not_matched_by_wildcards() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "public/app.js", "app");
        write(temp.path(), "public/.eslintrc.js", "lint");
        write(temp.path(), "public/.cache/x.js", "cached");

        let generation = generator(temp.path(), &["public/**/*.js"]).build().unwrap();

        assert_eq!(paths(&generation.manifest), vec!["public/app.js"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_static_file_is_skipped_with_warning() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "ok.js", "ok");
        std::os::unix::fs::symlink(temp.path().join("missing.js"), temp.path().join("bad.js"))
            .unwrap();

        let generation = generator(temp.path(), &["*.js"]).generate().unwrap();

        assert_eq!(paths(&generation.manifest), vec!["ok.js"]);
        assert_eq!(generation.skipped.len(), 1);
        assert!(matches!(generation.skipped[0], SkippedFile::Read { .. }));
        assert!(generation.skipped[0].path().ends_with("bad.js"));
        assert!(temp.path().join("sw.js").exists());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1_500), "1.5 kB");
        assert_eq!(format_size(2_097_152), "2.1 MB");
    }
}
