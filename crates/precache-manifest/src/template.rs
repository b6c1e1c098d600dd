//! Service worker script rendering.
//!
//! The worker body is a fixed template; only the manifest and a handful of
//! runtime options are substituted. Every substituted value is rendered as a
//! JavaScript literal ahead of time, so the template performs no escaping.

use minijinja::{AutoEscape, Environment, context};

use crate::error::GenerateError;
use crate::generator::GeneratorConfig;
use crate::manifest::Manifest;

const TEMPLATE_NAME: &str = "service-worker.js";
const TEMPLATE: &str = include_str!("../templates/service-worker.js");

/// Render the worker script for `manifest`.
pub(crate) fn render_service_worker(
    manifest: &Manifest,
    config: &GeneratorConfig,
) -> Result<String, GenerateError> {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_keep_trailing_newline(true);
    env.add_template(TEMPLATE_NAME, TEMPLATE)?;

    let ignore_url_parameters_matching = config
        .ignore_url_parameters_matching
        .iter()
        .map(|pattern| serde_json::to_string(pattern).map(|p| format!("new RegExp({p})")))
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");

    let rendered = env.get_template(TEMPLATE_NAME)?.render(context! {
        version => env!("CARGO_PKG_VERSION"),
        precache_config => manifest.to_precache_config()?,
        cache_id => serde_json::to_string(&config.cache_id)?,
        ignore_url_parameters_matching => ignore_url_parameters_matching,
        directory_index => serde_json::to_string(&config.directory_index)?,
        navigate_fallback => serde_json::to_string(&config.navigate_fallback)?,
        handle_fetch => config.handle_fetch.to_string(),
    })?;

    Ok(rendered)
}
