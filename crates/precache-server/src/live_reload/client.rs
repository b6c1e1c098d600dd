//! Browser side of live reload.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::state::AppState;

/// Path the injected script tag points at.
pub(crate) const CLIENT_PATH: &str = "/__precache/live-reload.js";

const CLIENT_SOURCE: &str = include_str!("../../assets/live-reload.js");

/// Render the client with the banner flag baked in.
pub(crate) fn client_script(notify: bool) -> String {
    CLIENT_SOURCE.replace("__PRECACHE_NOTIFY__", if notify { "true" } else { "false" })
}

/// Serve the live reload client.
pub(crate) async fn client_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        state.client_script.clone(),
    )
}
