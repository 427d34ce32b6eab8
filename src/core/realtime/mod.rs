//! Realtime voice protocol.
//!
//! Shared error and state types plus the OpenAI Realtime event model used
//! by both the relay and the client transport.

mod base;
pub mod openai;

pub use base::{ConnectionState, RealtimeError, RealtimeResult, TranscriptRole};
