//! Service worker precache manifest generation.
//!
//! Expands a set of glob patterns against a root directory, hashes every
//! matched file, and writes an installable service worker script (`sw.js`)
//! with the resulting manifest embedded in it.
//!
//! # Manifest
//!
//! The manifest maps each public resource path (the file path with the root
//! directory removed) to a revision token: the MD5 of the file contents.
//! Tokens change if and only if content changes, so a browser-side worker can
//! invalidate exactly the stale entries. Entries are ordered by path, which
//! makes repeated runs over an unchanged tree byte-identical.
//!
//! # Example
//!
//! ```ignore
//! use precache_manifest::{GeneratorConfig, ManifestGenerator};
//!
//! let config = GeneratorConfig::new("./", vec!["index.html".to_owned(), "style.css".to_owned()]);
//! let generation = ManifestGenerator::new(config).generate()?;
//! for (path, revision) in generation.manifest.iter() {
//!     println!("{path} {revision}");
//! }
//! ```

mod error;
mod generator;
mod manifest;
mod pattern;
mod revision;
mod template;

use std::path::PathBuf;

pub use error::{GenerateError, SkippedFile};
pub use generator::{
    DEFAULT_MAXIMUM_FILE_SIZE, DEFAULT_OUTPUT, Generation, GeneratorConfig, ManifestGenerator,
};
pub use manifest::Manifest;
pub use pattern::PatternSet;
pub use revision::revision_of;

/// Generate `<root_dir>/sw.js` from `patterns` using default options.
///
/// Returns the manifest that was embedded in the written script.
///
/// # Errors
///
/// Returns [`GenerateError::NotFound`] if `root_dir` is not a directory and
/// [`GenerateError::GlobExpansion`] if a pattern is malformed. Neither case
/// touches the output file.
pub fn generate(
    root_dir: impl Into<PathBuf>,
    patterns: &[String],
) -> Result<Manifest, GenerateError> {
    let config = GeneratorConfig::new(root_dir, patterns.to_vec());
    ManifestGenerator::new(config)
        .generate()
        .map(|generation| generation.manifest)
}
