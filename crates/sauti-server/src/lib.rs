//! Sauti Server - duplex WebSocket front end for the speech job engine.
//!
//! The listener accepts persistent client connections (plaintext or TLS),
//! frames binary MessagePack envelopes, funnels every job through the
//! single serialized execution engine and routes progress/terminal events
//! back to whichever connection is registered for each request id. Plain
//! HTTP GET requests on the same port get a static liveness banner.

pub mod backend;
pub mod gateway;
pub mod registry;
pub mod routing;
pub mod state;
pub mod ws;

use axum::routing::any;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the application router: every path answers either a WebSocket
/// upgrade (the duplex protocol) or the plain HTTP banner.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .fallback(any(ws::duplex_or_banner))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
