//! Realtime WebSocket event types.
//!
//! All events are JSON text frames tagged by a `type` field.
//!
//! Client events (sent upstream):
//! - session.update - Configure the session once connected
//! - input_audio_buffer.append - Append a captured audio frame
//! - conversation.item.create - Add a user message or a function call result
//! - response.create - Ask for a response to the current conversation
//!
//! Server events (received from upstream, or synthesized by the relay):
//! - response.audio.delta / response.audio.done - Assistant audio
//! - response.audio_transcript.delta - Assistant transcript chunk
//! - conversation.item.input_audio_transcription.completed - User transcript
//! - response.function_call_arguments.done - Completed function call
//! - bid_created - Bid extracted by the relay
//! - error - Error reported by the service or the relay
//!
//! Unrecognized server events deserialize as [`ServerEvent::Unknown`] so they
//! can still be passed through.

use serde::{Deserialize, Serialize};

use super::session::SessionConfig;
use crate::core::audio::pcm::encode_frame_base64;

// =============================================================================
// Conversation Items
// =============================================================================

/// Content part of a conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text typed by the user
    InputText { text: String },
}

/// Conversation item added by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    /// A message in the conversation
    Message {
        role: String,
        content: Vec<ContentPart>,
    },
    /// Result of a function call, correlated by `call_id`
    FunctionCallOutput { call_id: String, output: String },
}

// =============================================================================
// Client Events
// =============================================================================

/// Events sent to the realtime service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Configure the session
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Append base64 PCM16 audio to the input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },

    /// Add an item to the conversation
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    /// Request a response
    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    /// Audio append carrying one captured linear frame.
    pub fn audio_append(samples: &[f32]) -> Self {
        Self::InputAudioBufferAppend {
            audio: encode_frame_base64(samples),
        }
    }

    /// A typed user message.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::ConversationItemCreate {
            item: ConversationItem::Message {
                role: "user".to_string(),
                content: vec![ContentPart::InputText { text: text.into() }],
            },
        }
    }

    /// The result of a function call.
    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::ConversationItemCreate {
            item: ConversationItem::FunctionCallOutput {
                call_id: call_id.into(),
                output: output.into(),
            },
        }
    }

    /// Wire tag of this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::ResponseCreate => "response.create",
        }
    }
}

// =============================================================================
// Server Events
// =============================================================================

/// Error details nested in upstream `error` events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Events received from the realtime service or the relay.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Error from upstream (`error.message`) or the relay (`message`)
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: Option<ApiError>,
        #[serde(default)]
        message: Option<String>,
    },

    /// Base64 PCM16 audio fragment
    #[serde(rename = "response.audio.delta")]
    AudioDelta { delta: String },

    /// End of the assistant's audio for this response
    #[serde(rename = "response.audio.done")]
    AudioDone {},

    /// Partial assistant transcript
    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta { delta: String },

    /// Finalized transcript of the user's speech
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted { transcript: String },

    /// Function call arguments finished streaming
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        call_id: String,
        name: String,
        arguments: String,
    },

    /// Bid extracted by the relay
    #[serde(rename = "bid_created")]
    BidCreated { bid_data: serde_json::Value },

    /// Any other event
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Human-readable message of an `error` event.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Error { error, message } => Some(
                message
                    .clone()
                    .or_else(|| error.as_ref().and_then(|e| e.message.clone()))
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ),
            _ => None,
        }
    }
}

// =============================================================================
// Relay Events
// =============================================================================

/// Events the relay itself sends to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// A bid was extracted from a completed `create_bid` call
    BidCreated { bid_data: serde_json::Value },
    /// Something went wrong on the relay or upstream leg
    Error { message: String },
}

impl RelayEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","message":"Failed to encode relay event"}"#.to_string()
        })
    }
}
