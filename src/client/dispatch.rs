//! Inbound message dispatch for a client session.
//!
//! [`SessionDispatcher`] turns each inbound text frame into the outputs the
//! session must perform, in order. It owns the `speaking` flag so that
//! speaking notifications are only produced on real transitions.

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, warn};

use super::events::UiEvent;
use crate::core::audio::pcm::decode_base64_audio;
use crate::core::realtime::TranscriptRole;
use crate::core::realtime::openai::ServerEvent;

/// Work produced by one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutput {
    SpeakingChanged(bool),
    /// Raw PCM16 fragment for the playback queue
    Play(Bytes),
    Event(UiEvent),
}

#[derive(Debug, Default)]
pub struct SessionDispatcher {
    speaking: bool,
}

impl SessionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Forget the speaking flag; returns whether the assistant was speaking.
    pub fn reset(&mut self) -> bool {
        std::mem::take(&mut self.speaking)
    }

    pub fn handle_inbound(&mut self, text: &str) -> Vec<SessionOutput> {
        let raw: Value = match serde_json::from_str(text) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Discarding malformed inbound message: {}", e);
                return Vec::new();
            }
        };

        let event = match serde_json::from_value::<ServerEvent>(raw.clone()) {
            Ok(event) => event,
            Err(e) => {
                let event_type = raw.get("type").and_then(|t| t.as_str()).unwrap_or("<none>");
                warn!(event_type = %event_type, "Discarding inbound event: {}", e);
                return Vec::new();
            }
        };

        let mut outputs = Vec::new();
        match event {
            ServerEvent::AudioDelta { delta } => match decode_base64_audio(&delta) {
                Ok(fragment) => {
                    self.set_speaking(true, &mut outputs);
                    outputs.push(SessionOutput::Play(fragment));
                }
                Err(e) => warn!("Dropping undecodable audio delta: {}", e),
            },
            ServerEvent::AudioDone {} => self.set_speaking(false, &mut outputs),
            ServerEvent::AudioTranscriptDelta { delta } => {
                outputs.push(SessionOutput::Event(UiEvent::Transcript {
                    role: TranscriptRole::Assistant,
                    text: delta,
                }));
            }
            ServerEvent::TranscriptionCompleted { transcript } => {
                outputs.push(SessionOutput::Event(UiEvent::Transcript {
                    role: TranscriptRole::User,
                    text: transcript,
                }));
            }
            ServerEvent::FunctionCallArgumentsDone {
                call_id,
                name,
                arguments,
            } => {
                debug!(call_id = %call_id, function = %name, "Function call completed");
                outputs.push(SessionOutput::Event(UiEvent::FunctionCall {
                    name,
                    call_id,
                    arguments,
                }));
            }
            ServerEvent::BidCreated { bid_data } => {
                outputs.push(SessionOutput::Event(UiEvent::BidCreated { bid_data }));
            }
            ref error @ ServerEvent::Error { .. } => {
                let message = error.error_message().unwrap_or_default();
                outputs.push(SessionOutput::Event(UiEvent::Error { message }));
            }
            ServerEvent::Unknown => outputs.push(SessionOutput::Event(UiEvent::ServerEvent(raw))),
        }
        outputs
    }

    fn set_speaking(&mut self, speaking: bool, outputs: &mut Vec<SessionOutput>) {
        if self.speaking != speaking {
            self.speaking = speaking;
            outputs.push(SessionOutput::SpeakingChanged(speaking));
        }
    }
}
