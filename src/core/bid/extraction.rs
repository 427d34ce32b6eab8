//! Interception of completed function calls on the upstream leg.
//!
//! Every `response.function_call_arguments.done` gets exactly one
//! `function_call_output` with the same `call_id`, whatever happens to the
//! arguments. The model stalls on an unanswered call.

use serde_json::json;
use tracing::{info, warn};

use super::{BidDraft, CREATE_BID_FUNCTION};
use crate::core::realtime::openai::messages::{ClientEvent, RelayEvent, ServerEvent};

/// What the relay must do for one completed function call.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallOutcome {
    /// Correlation id shared by the call and its output
    pub call_id: String,
    /// Serialized events for the client, sent before the original event
    pub client_notices: Vec<String>,
    /// Parsed bid for the business layer
    pub draft: Option<BidDraft>,
    /// Serialized `conversation.item.create` answering the call
    pub acknowledgement: String,
}

fn output_body(success: bool, message: &str) -> String {
    json!({ "success": success, "message": message }).to_string()
}

fn acknowledgement(call_id: &str, success: bool, message: &str) -> String {
    let event = ClientEvent::function_call_output(call_id, output_body(success, message));
    serde_json::to_string(&event).unwrap_or_default()
}

/// Inspect an upstream text frame; `None` unless it completes a function call.
pub fn intercept_function_call(text: &str) -> Option<FunctionCallOutcome> {
    let Ok(ServerEvent::FunctionCallArgumentsDone {
        call_id,
        name,
        arguments,
    }) = serde_json::from_str::<ServerEvent>(text)
    else {
        return None;
    };

    if name != CREATE_BID_FUNCTION {
        warn!(call_id = %call_id, function = %name, "Model called an undeclared function");
        let acknowledgement =
            acknowledgement(&call_id, false, &format!("Unknown function: {name}"));
        return Some(FunctionCallOutcome {
            call_id,
            client_notices: Vec::new(),
            draft: None,
            acknowledgement,
        });
    }

    let outcome = match BidDraft::from_arguments(&arguments) {
        Ok(draft) => {
            info!(call_id = %call_id, name = %draft.name, "Extracted bid draft");
            let notice = RelayEvent::BidCreated {
                bid_data: draft.to_value(),
            };
            FunctionCallOutcome {
                acknowledgement: acknowledgement(&call_id, true, "Bid created successfully!"),
                call_id,
                client_notices: vec![notice.to_json()],
                draft: Some(draft),
            }
        }
        Err(e) => {
            warn!(call_id = %call_id, "Rejected create_bid arguments: {}", e);
            let message = format!("Could not create bid: {e}");
            FunctionCallOutcome {
                acknowledgement: acknowledgement(&call_id, false, &message),
                call_id,
                client_notices: vec![RelayEvent::error(message).to_json()],
                draft: None,
            }
        }
    };

    Some(outcome)
}
