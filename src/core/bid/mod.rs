//! Structured bid extraction.
//!
//! The realtime model gathers bid details by voice and finishes by calling
//! `create_bid`. This module parses those arguments into a [`BidDraft`],
//! builds the acknowledgement the model waits for, and hands the draft to a
//! [`BidSink`].

use thiserror::Error;

pub mod draft;
pub mod extraction;
pub mod sink;

pub use draft::{BidDraft, BidType, Priority};
pub use extraction::{FunctionCallOutcome, intercept_function_call};
pub use sink::{BidSink, ChannelBidSink, LoggingBidSink, WebhookBidSink};

/// Name of the function declared to the model.
pub const CREATE_BID_FUNCTION: &str = "create_bid";

/// Errors raised while extracting or delivering bids.
#[derive(Debug, Error)]
pub enum BidError {
    /// Arguments were not valid JSON for a bid
    #[error("Invalid bid arguments: {0}")]
    InvalidArguments(String),

    /// A mandatory field was missing or blank
    #[error("Missing required bid field: {0}")]
    MissingField(&'static str),

    /// Delivery to the webhook failed
    #[error("Bid webhook error: {0}")]
    Webhook(String),
}

/// Result type for bid operations.
pub type BidResult<T> = Result<T, BidError>;
