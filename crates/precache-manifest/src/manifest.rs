//! Manifest model and public path rewriting.

use std::collections::BTreeMap;
use std::path::{Component, Path};

/// Ordered mapping from public resource path to revision token.
///
/// Ordering is lexicographic by path so that identical trees always
/// serialize identically.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    /// Create an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning the previous revision for `path`.
    pub fn insert(&mut self, path: String, revision: String) -> Option<String> {
        self.entries.insert(path, revision)
    }

    /// Revision for a public path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(path, revision)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, r)| (p.as_str(), r.as_str()))
    }

    /// Serialize as the `[[path, revision], ...]` array the worker expects.
    pub fn to_precache_config(&self) -> Result<String, serde_json::Error> {
        let pairs: Vec<[&str; 2]> = self.iter().map(|(p, r)| [p, r]).collect();
        serde_json::to_string(&pairs)
    }
}

/// Turns root-relative file paths into public resource paths.
#[derive(Clone, Debug, Default)]
pub(crate) struct PathRewrite {
    strip_prefix: String,
    replace_prefix: String,
}

impl PathRewrite {
    /// `strip_prefix` is removed from the start of the root-relative path,
    /// then `replace_prefix` is prepended. A leading `./` in `strip_prefix`
    /// refers to the root itself and is ignored.
    pub(crate) fn new(strip_prefix: Option<&str>, replace_prefix: &str) -> Self {
        let mut strip = strip_prefix.unwrap_or_default();
        while let Some(rest) = strip.strip_prefix("./") {
            strip = rest;
        }
        if strip == "." {
            strip = "";
        }

        Self {
            strip_prefix: strip.to_owned(),
            replace_prefix: replace_prefix.to_owned(),
        }
    }

    pub(crate) fn public_path(&self, relative: &Path) -> String {
        let joined = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");

        let stripped = joined
            .strip_prefix(self.strip_prefix.as_str())
            .unwrap_or(&joined);

        format!("{}{stripped}", self.replace_prefix)
    }
}
