//! Glob pattern sets with brace alternation.
//!
//! The `glob` crate has no `{a,b}` syntax, so every pattern is expanded into
//! its plain alternatives before compiling. `public/**/*.{js,css}` becomes
//! `public/**/*.js` and `public/**/*.css`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::error::{GenerateError, SkippedFile};

/// `*` stays within one path segment; `**` crosses segments. Neither matches
/// a leading dot, so hidden files and directories need an explicit `.`.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Compiled, root-relative glob patterns.
#[derive(Clone, Debug)]
pub struct PatternSet {
    globs: Vec<String>,
    compiled: Vec<Pattern>,
}

impl PatternSet {
    /// Expand and compile `patterns`.
    ///
    /// Leading `./` and `/` are dropped: patterns are always relative to the
    /// directory they are matched against.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::GlobExpansion`] for unbalanced braces or an
    /// invalid glob.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, GenerateError> {
        let mut globs = Vec::new();
        let mut compiled = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            let invalid = |message: String| GenerateError::GlobExpansion {
                pattern: pattern.to_owned(),
                message,
            };

            for glob in expand_braces(normalize(pattern)).map_err(invalid)? {
                let compiled_glob = Pattern::new(&glob).map_err(|e| invalid(e.to_string()))?;
                compiled.push(compiled_glob);
                globs.push(glob);
            }
        }

        Ok(Self { globs, compiled })
    }

    /// Returns true if no patterns were given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    /// Check a root-relative path against every pattern.
    #[must_use]
    pub fn matches(&self, relative: &Path) -> bool {
        self.compiled
            .iter()
            .any(|pattern| pattern.matches_path_with(relative, MATCH_OPTIONS))
    }

    /// Walk the filesystem under `root` and collect every matching path.
    ///
    /// Directories that cannot be read are reported as skipped instead of
    /// failing the walk.
    pub(crate) fn expand(
        &self,
        root: &Path,
    ) -> Result<(BTreeSet<PathBuf>, Vec<SkippedFile>), GenerateError> {
        let root_str = root.to_string_lossy();
        let root_prefix = Pattern::escape(root_str.trim_end_matches('/'));

        let mut files = BTreeSet::new();
        let mut skipped = Vec::new();

        for glob in &self.globs {
            let full = format!("{root_prefix}/{glob}");
            let paths =
                glob::glob_with(&full, MATCH_OPTIONS).map_err(|e| GenerateError::GlobExpansion {
                    pattern: glob.clone(),
                    message: e.to_string(),
                })?;

            for entry in paths {
                match entry {
                    Ok(path) => {
                        files.insert(path);
                    }
                    Err(err) => {
                        let path = err.path().to_path_buf();
                        tracing::warn!(path = %path.display(), "Failed to read while expanding globs");
                        skipped.push(SkippedFile::Read {
                            path,
                            source: err.into(),
                        });
                    }
                }
            }
        }

        Ok((files, skipped))
    }
}

/// Strip leading `./` and `/` segments.
fn normalize(pattern: &str) -> &str {
    let mut rest = pattern;
    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            return rest;
        }
    }
}

/// Expand `{a,b}` groups, including nested ones, into plain patterns.
fn expand_braces(pattern: &str) -> Result<Vec<String>, String> {
    let Some(open) = pattern.find('{') else {
        if pattern.contains('}') {
            return Err("unmatched `}`".to_owned());
        }
        return Ok(vec![pattern.to_owned()]);
    };

    if pattern[..open].contains('}') {
        return Err("unmatched `}`".to_owned());
    }

    let mut depth = 0usize;
    let mut close = None;
    let mut bounds = vec![open];

    for (offset, c) in pattern[open..].char_indices() {
        let index = open + offset;
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(index);
                    break;
                }
            }
            ',' if depth == 1 => bounds.push(index),
            _ => {}
        }
    }

    let close = close.ok_or_else(|| "unclosed `{`".to_owned())?;
    bounds.push(close);

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];

    let mut expanded = Vec::new();
    for pair in bounds.windows(2) {
        let alternative = &pattern[pair[0] + 1..pair[1]];
        for tail in expand_braces(&format!("{alternative}{suffix}"))? {
            expanded.push(format!("{prefix}{tail}"));
        }
    }

    Ok(expanded)
}
