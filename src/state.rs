use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::bid::{BidSink, LoggingBidSink, WebhookBidSink};
use crate::core::realtime::openai::{OpenAIUpstream, bid_session_update};
use crate::core::relay::UpstreamConnector;

/// Shared state for all relay sessions.
pub struct AppState {
    pub config: ServerConfig,
    /// `None` when no upstream credential is configured
    pub upstream: Option<Arc<dyn UpstreamConnector>>,
    pub bid_sink: Arc<dyn BidSink>,
    /// Serialized `session.update` sent first on every upstream leg
    pub session_update: String,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let upstream: Option<Arc<dyn UpstreamConnector>> = match config.openai_api_key.as_deref() {
            Some(key) => {
                match OpenAIUpstream::new(&config.realtime_url, config.realtime_model, key) {
                    Ok(upstream) => Some(Arc::new(upstream)),
                    Err(e) => {
                        warn!("Realtime upstream disabled: {}", e);
                        None
                    }
                }
            }
            None => {
                warn!("OPENAI_API_KEY not configured, relay sessions will be rejected");
                None
            }
        };

        let bid_sink: Arc<dyn BidSink> = match config.bid_webhook_url.as_deref() {
            Some(url) => match WebhookBidSink::new(url, config.bid_webhook_token.clone()) {
                Ok(sink) => {
                    info!(url = %url, "Delivering bids to webhook");
                    Arc::new(sink)
                }
                Err(e) => {
                    warn!("Bid webhook disabled: {}", e);
                    Arc::new(LoggingBidSink)
                }
            },
            None => Arc::new(LoggingBidSink),
        };

        let session_update = bid_session_update(config.realtime_voice);
        Self::with_components(config, upstream, bid_sink, session_update)
    }

    /// Assemble state from explicit parts.
    pub fn with_components(
        config: ServerConfig,
        upstream: Option<Arc<dyn UpstreamConnector>>,
        bid_sink: Arc<dyn BidSink>,
        session_update: String,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            upstream,
            bid_sink,
            session_update,
        })
    }
}
