//! Environment variable expansion for configuration strings.

use crate::ConfigError;

/// Expand `$VAR`, `${VAR}` and `${VAR:-default}` references in `value`.
///
/// `field` names the configuration key for error messages.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    shellexpand::env(value)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} not set", e.var_name),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_is_unchanged() {
        assert_eq!(expand_env("127.0.0.1", "server.host").unwrap(), "127.0.0.1");
    }

    #[test]
    fn test_default_used_when_unset() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("PRECACHE_EXPAND_UNSET");
        }
        assert_eq!(
            expand_env("${PRECACHE_EXPAND_UNSET:-site}", "generator.root_dir").unwrap(),
            "site"
        );
    }

    #[test]
    fn test_missing_variable_names_field() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("PRECACHE_EXPAND_MISSING");
        }
        let err = expand_env("${PRECACHE_EXPAND_MISSING}", "server.host").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("server.host"));
        assert!(msg.contains("PRECACHE_EXPAND_MISSING"));
    }
}
