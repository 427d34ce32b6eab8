use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// HTTP-level failures of the relay endpoints.
#[derive(Debug, Error)]
pub enum AppError {
    /// No upstream credential configured; sessions cannot be relayed
    #[error("OPENAI_API_KEY not configured")]
    MissingCredential,

    /// A plain request reached the WebSocket endpoint
    #[error("Expected websocket")]
    UpgradeRequired,
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::MissingCredential => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
            AppError::UpgradeRequired => {
                (StatusCode::UPGRADE_REQUIRED, self.to_string()).into_response()
            }
        }
    }
}
