//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::live_reload;
use crate::middleware::headers;
use crate::state::AppState;
use crate::static_files;

/// Create the application router.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new();

    if state.live_reload_enabled() {
        router = router
            .route(live_reload::WS_PATH, get(live_reload::ws_handler))
            .route(live_reload::CLIENT_PATH, get(live_reload::client_handler));
    }

    router = router.merge(static_files::static_router());

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(headers::no_cache_layer())
                .layer(headers::content_type_options_layer()),
        )
        .with_state(state)
}
