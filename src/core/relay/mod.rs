//! Server-side relay between a client socket and the realtime service.
//!
//! [`RelayBridge`] is a pure state machine deciding what to do with each
//! event; [`run_bridge`] drives it over two [`Leg`]s and an
//! [`UpstreamConnector`].

use thiserror::Error;

pub mod bridge;
pub mod frame;
pub mod session;
pub mod upstream;

pub use bridge::{BridgeAction, BridgeEvent, BridgeState, RelayBridge};
pub use frame::{Leg, LegEvent, RelayFrame, channel_leg, client_leg, upstream_leg};
pub use session::{BridgeOptions, run_bridge};
pub use upstream::{OpenAIUpstream, UpstreamConnector};

/// Client-facing message when no upstream credential is configured.
pub const MISSING_CREDENTIAL_MESSAGE: &str = "OPENAI_API_KEY not configured";
/// Client-facing message when the upstream cannot be reached in time.
pub const CONNECT_FAILED_MESSAGE: &str = "Failed to connect to voice service";
/// Client-facing message for upstream transport errors.
pub const UPSTREAM_ERROR_MESSAGE: &str = "OpenAI connection error";
/// Client-facing message when upstream hangs up mid-session.
pub const UPSTREAM_CLOSED_MESSAGE: &str = "Voice service connection closed";

/// Errors on a relay leg.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Socket send/receive failed
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
