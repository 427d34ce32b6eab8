//! Relay WebSocket handler
//!
//! Upgrades the client connection and runs one relay session between it and
//! the realtime service until either side hangs up.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    response::Response,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::relay::{BridgeOptions, RelayBridge, client_leg, run_bridge};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// `GET /realtime-chat`
///
/// # Errors
/// - 500 with a JSON body when no upstream credential is configured
/// - 426 when the request is not a WebSocket upgrade
pub async fn realtime_chat_handler(
    State(state): State<Arc<AppState>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> AppResult<Response> {
    if state.upstream.is_none() {
        return Err(AppError::MissingCredential);
    }
    let ws = ws.map_err(|e| {
        debug!("Rejected non-upgrade request: {}", e);
        AppError::UpgradeRequired
    })?;

    info!("Relay WebSocket connection upgrade requested");
    Ok(ws
        .max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_relay_socket(socket, state)))
}

async fn handle_relay_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4().to_string();
    info!(session_id = %session_id, "Relay session started");

    let bridge = RelayBridge::new(state.session_update.clone(), state.upstream.is_some());
    run_bridge(
        bridge,
        client_leg(socket),
        state.upstream.clone(),
        state.bid_sink.clone(),
        BridgeOptions {
            session_id: session_id.clone(),
            connect_timeout: state.config.upstream_connect_timeout(),
        },
    )
    .await;

    info!(session_id = %session_id, "Relay session ended");
}
