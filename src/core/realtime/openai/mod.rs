//! OpenAI Realtime API protocol.
//!
//! Event shapes, the bid-gathering session configuration and the
//! authenticated upstream connector. Audio is PCM 16-bit signed
//! little-endian at 24kHz in both directions.

pub mod client;
pub mod config;
pub mod messages;
pub mod session;

pub use client::OpenAIUpstream;
pub use config::{
    OPENAI_BETA_HEADER, OPENAI_REALTIME_URL, RealtimeModel, RealtimeVoice, build_ws_url,
};
pub use messages::{ClientEvent, ConversationItem, RelayEvent, ServerEvent};
pub use session::{SessionConfig, bid_session_config, bid_session_update};
