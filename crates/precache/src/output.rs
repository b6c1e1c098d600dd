//! Colored terminal output utilities.

use console::{Style, Term};

/// Terminal output formatter.
pub(crate) struct Output {
    term: Term,
    prefix: Option<String>,
    green: Style,
    yellow: Style,
    red: Style,
    cyan_bold: Style,
}

impl Output {
    /// Create a new output formatter.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            prefix: None,
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            cyan_bold: Style::new().cyan().bold(),
        }
    }

    /// Prefix every line with `[prefix]`.
    #[must_use]
    pub(crate) fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = (!prefix.is_empty()).then(|| format!("[{prefix}] "));
        self
    }

    fn line(&self, msg: &str, style: Option<&Style>) {
        let msg = match style {
            Some(style) => style.apply_to(msg).to_string(),
            None => msg.to_owned(),
        };
        let line = match &self.prefix {
            Some(prefix) => format!("{}{msg}", self.cyan_bold.apply_to(prefix)),
            None => msg,
        };
        let _ = self.term.write_line(&line);
    }

    /// Print an info message.
    pub(crate) fn info(&self, msg: &str) {
        self.line(msg, None);
    }

    /// Print a success message (green).
    pub(crate) fn success(&self, msg: &str) {
        self.line(msg, Some(&self.green));
    }

    /// Print a warning message (yellow).
    pub(crate) fn warning(&self, msg: &str) {
        self.line(msg, Some(&self.yellow));
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        self.line(msg, Some(&self.red));
    }

    /// Print a highlighted message (cyan bold).
    pub(crate) fn highlight(&self, msg: &str) {
        self.line(msg, Some(&self.cyan_bold));
    }
}
