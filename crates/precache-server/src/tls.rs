//! Self-signed HTTPS.
//!
//! A fresh certificate is generated on every start and never written to
//! disk. Browsers will warn on first access.

use axum_server::tls_rustls::RustlsConfig;
use rcgen::CertifiedKey;

use crate::error::ServerError;

/// Build a rustls config with a self-signed certificate for `host`.
pub(crate) async fn self_signed_config(host: &str) -> Result<RustlsConfig, ServerError> {
    // Fails if a provider is already installed, which is fine
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let CertifiedKey { cert, key_pair } = rcgen::generate_simple_self_signed(subject_alt_names(host))?;
    tracing::debug!(host, "Generated self-signed certificate");

    RustlsConfig::from_pem(cert.pem().into_bytes(), key_pair.serialize_pem().into_bytes())
        .await
        .map_err(|e| ServerError::Tls(e.to_string()))
}

/// Names the certificate is valid for.
fn subject_alt_names(host: &str) -> Vec<String> {
    let mut names = vec!["localhost".to_owned(), "127.0.0.1".to_owned()];
    let wildcard = matches!(host, "0.0.0.0" | "::" | "[::]");
    if !wildcard && !names.iter().any(|name| name == host) {
        names.push(host.to_owned());
    }
    names
}
