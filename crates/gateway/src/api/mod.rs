//! HTTP surface.
//!
//! Two routes: the health probe and the tool-call handler. Everything else
//! the system does is a tool behind `POST /cv-tool-call-handler`.

pub mod health;
pub mod tool_call;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/cv-tool-call-handler", post(tool_call::handle))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
