use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::mount::MountTable;

/// Build the router: every request goes through the mount table.
pub fn build_router(mounts: Arc<MountTable>) -> Router {
    Router::new()
        .fallback(handler::dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(mounts)
}
