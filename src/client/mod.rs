//! Client side of a voice session.
//!
//! A [`TransportSession`] owns one duplex socket to the relay, streams
//! captured microphone frames out, plays assistant audio in arrival order
//! and reports everything else to the UI as [`UiEvent`]s.

use thiserror::Error;

use crate::core::audio::AudioError;

pub mod dispatch;
pub mod events;
pub mod session;

pub use dispatch::{SessionDispatcher, SessionOutput};
pub use events::{MessageCallback, SpeakingCallback, UiEvent};
pub use session::{SessionAudio, TransportSession};

/// Errors raised by the client transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The channel is not open
    #[error("Not connected")]
    NotConnected,

    /// `connect()` was called on a session that already ran
    #[error("Session already connected or finished")]
    AlreadyConnected,

    /// The socket could not be opened
    #[error("Connection error: {0}")]
    Connection(String),

    /// An outbound event could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Microphone capture failed to start
    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Result type for client transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
