//! Relay WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::realtime::realtime_chat_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the relay router
///
/// # Endpoint
///
/// `GET /realtime-chat` - WebSocket upgrade for a relayed voice session
///
/// # Protocol
///
/// Frames are forwarded verbatim in both directions. The server first
/// configures the upstream session for bid gathering, answers every
/// `create_bid` call itself, and adds these events for the client:
///
/// ```json
/// {"type": "bid_created", "bid_data": {"name": "...", "bid_type": "spot"}}
/// {"type": "error", "message": "Failed to connect to voice service"}
/// ```
pub fn create_realtime_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/realtime-chat", get(realtime_chat_handler))
        .layer(TraceLayer::new_for_http())
}
