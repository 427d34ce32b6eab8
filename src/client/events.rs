//! Events surfaced to the UI.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::core::realtime::TranscriptRole;

/// One UI-facing occurrence on a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    Connected,
    Disconnected,
    Transcript {
        role: TranscriptRole,
        text: String,
    },
    BidCreated {
        bid_data: Value,
    },
    FunctionCall {
        name: String,
        call_id: String,
        arguments: String,
    },
    Error {
        message: String,
    },
    /// Any other inbound event, as received
    ServerEvent(Value),
}

impl UiEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Receives every [`UiEvent`] in order.
pub type MessageCallback = Arc<dyn Fn(UiEvent) + Send + Sync>;

/// Receives assistant speaking transitions; never called twice with the same value.
pub type SpeakingCallback = Arc<dyn Fn(bool) + Send + Sync>;
