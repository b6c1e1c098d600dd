//! Live-reload snippet injection.

use std::borrow::Cow;

use crate::live_reload::CLIENT_PATH;

/// Replaces a literal marker in HTML pages with the live-reload script tag.
#[derive(Clone, Debug)]
pub(crate) struct Snippet {
    marker: String,
    tag: String,
}

impl Snippet {
    pub(crate) fn new(marker: &str) -> Self {
        Self {
            marker: marker.to_owned(),
            tag: format!(r#"<script async src="{CLIENT_PATH}"></script>"#),
        }
    }

    /// Replace the first marker occurrence; pages without it pass through.
    pub(crate) fn inject<'a>(&self, html: &'a str) -> Cow<'a, str> {
        if self.marker.is_empty() || !html.contains(&self.marker) {
            return Cow::Borrowed(html);
        }
        Cow::Owned(html.replacen(&self.marker, &self.tag, 1))
    }
}
