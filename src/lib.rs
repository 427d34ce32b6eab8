pub mod client;
pub mod config;
pub mod core;
pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;

// Re-export commonly used items for convenience
pub use client::{TransportError, TransportResult, TransportSession, UiEvent};
pub use config::ServerConfig;
pub use core::*;
pub use errors::app_error::{AppError, AppResult};
pub use state::AppState;

/// Build the full HTTP application: health check and relay endpoint.
///
/// CORS and security headers are applied by the binary.
pub fn app(state: std::sync::Arc<AppState>) -> axum::Router {
    routes::api::create_api_router()
        .merge(routes::realtime::create_realtime_router())
        .with_state(state)
}
