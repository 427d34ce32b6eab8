//! Session configuration sent upstream as the first `session.update`.
//!
//! The bid-gathering session asks for text and audio responses, PCM16 in both
//! directions, Whisper transcription of the caller, server-side VAD turn
//! detection and exactly one declared function, `create_bid`.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::config::{INPUT_TRANSCRIPTION_MODEL, PCM16_FORMAT, RealtimeVoice};
use super::messages::ClientEvent;
use crate::core::bid::CREATE_BID_FUNCTION;

/// Behavioral policy for the bid-gathering assistant.
pub const BID_INSTRUCTIONS: &str = "\
You are a helpful assistant for creating transportation bids. Your job is to help users create \
comprehensive bid requests by gathering the following information:

1. Basic Information:
   - Bid name (e.g., \"Q1 2024 Regional Lanes\")
   - Description of the bid scope
   - Bid type (contract, spot, seasonal, regional)
   - Priority level (low, medium, high, urgent)
   - Budget estimate

2. Timeline:
   - Bid start date
   - Bid end date
   - Submission deadline

3. Lane Selection:
   - Origin locations
   - Destination locations
   - Expected volumes
   - Distance estimates

4. Requirements:
   - Equipment type (dry van, reefer, flatbed, container)
   - Service level (standard, expedited, white glove)
   - Special handling instructions

Ask questions naturally to gather this information. Be conversational and helpful. Once you have \
enough information, summarize what you've collected and ask if they want to create the bid.

When ready to create the bid, call the create_bid function with all the collected information.";

/// Server VAD activation threshold.
pub const VAD_THRESHOLD: f32 = 0.5;
/// Audio kept before detected speech, in ms.
pub const VAD_PREFIX_PADDING_MS: u32 = 300;
/// Silence that ends a turn, in ms.
pub const VAD_SILENCE_DURATION_MS: u32 = 1000;

const TEMPERATURE: f32 = 0.8;
const MAX_RESPONSE_OUTPUT_TOKENS: i32 = 4096;

/// Session configuration payload of `session.update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_response_output_tokens: Option<i32>,
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnDetection {
    ServerVad {
        threshold: f32,
        prefix_padding_ms: u32,
        silence_duration_ms: u32,
    },
}

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments
    pub parameters: serde_json::Value,
}

/// The `create_bid` declaration, whose schema mirrors [`crate::core::bid::BidDraft`].
pub fn create_bid_tool() -> ToolDef {
    ToolDef {
        tool_type: "function".to_string(),
        name: CREATE_BID_FUNCTION.to_string(),
        description: "Create a new transportation bid with the collected information".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Bid name" },
                "description": { "type": "string", "description": "Bid description" },
                "bid_type": { "type": "string", "enum": ["contract", "spot", "seasonal", "regional"] },
                "priority": { "type": "string", "enum": ["low", "medium", "high", "urgent"] },
                "budget": { "type": "number", "description": "Budget in currency units" },
                "start_date": { "type": "string", "description": "ISO date string for bid start" },
                "end_date": { "type": "string", "description": "ISO date string for bid end" },
                "submission_deadline": { "type": "string", "description": "ISO datetime string for submission deadline" },
                "equipment_type": { "type": "string", "description": "Required equipment type" },
                "service_level": { "type": "string", "description": "Required service level" },
                "special_instructions": { "type": "string", "description": "Any special handling requirements" }
            },
            "required": ["name", "bid_type", "start_date", "end_date", "submission_deadline"]
        }),
    }
}

/// Full bid-gathering session configuration for the given voice.
pub fn bid_session_config(voice: RealtimeVoice) -> SessionConfig {
    SessionConfig {
        modalities: Some(vec!["text".to_string(), "audio".to_string()]),
        instructions: Some(BID_INSTRUCTIONS.to_string()),
        voice: Some(voice.as_str().to_string()),
        input_audio_format: Some(PCM16_FORMAT.to_string()),
        output_audio_format: Some(PCM16_FORMAT.to_string()),
        input_audio_transcription: Some(InputAudioTranscription {
            model: INPUT_TRANSCRIPTION_MODEL.to_string(),
        }),
        turn_detection: Some(TurnDetection::ServerVad {
            threshold: VAD_THRESHOLD,
            prefix_padding_ms: VAD_PREFIX_PADDING_MS,
            silence_duration_ms: VAD_SILENCE_DURATION_MS,
        }),
        tools: Some(vec![create_bid_tool()]),
        tool_choice: Some("auto".to_string()),
        temperature: Some(TEMPERATURE),
        max_response_output_tokens: Some(MAX_RESPONSE_OUTPUT_TOKENS),
    }
}

/// Serialized `session.update` event for the bid-gathering session.
pub fn bid_session_update(voice: RealtimeVoice) -> String {
    let event = ClientEvent::SessionUpdate {
        session: bid_session_config(voice),
    };
    // Plain structs and strings only; encoding cannot fail.
    serde_json::to_string(&event).unwrap_or_default()
}
