//! Business-layer receivers for extracted bids.
//!
//! A [`BidSink`] is called from the relay's dispatch loop and must return
//! immediately; anything slow is scheduled onto its own task.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use super::{BidDraft, BidError, BidResult};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives each bid extracted by the relay, at most once per function call.
pub trait BidSink: Send + Sync {
    fn bid_created(&self, session_id: &str, draft: BidDraft);
}

/// Logs bids and does nothing else.
#[derive(Debug, Default, Clone)]
pub struct LoggingBidSink;

impl BidSink for LoggingBidSink {
    fn bid_created(&self, session_id: &str, draft: BidDraft) {
        info!(
            session_id = %session_id,
            name = %draft.name,
            bid_type = %draft.bid_type,
            start_date = %draft.start_date,
            end_date = %draft.end_date,
            submission_deadline = %draft.submission_deadline,
            "Bid draft created"
        );
    }
}

/// Hands bids to an in-process consumer over a channel.
#[derive(Debug, Clone)]
pub struct ChannelBidSink {
    tx: mpsc::UnboundedSender<(String, BidDraft)>,
}

impl ChannelBidSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, BidDraft)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl BidSink for ChannelBidSink {
    fn bid_created(&self, session_id: &str, draft: BidDraft) {
        if self.tx.send((session_id.to_string(), draft)).is_err() {
            warn!(session_id = %session_id, "Bid receiver dropped, discarding bid draft");
        }
    }
}

/// POSTs each bid as JSON to an HTTP endpoint.
pub struct WebhookBidSink {
    client: reqwest::Client,
    url: String,
    token: Option<Zeroizing<String>>,
}

impl WebhookBidSink {
    pub fn new(url: impl Into<String>, token: Option<String>) -> BidResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| BidError::Webhook(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            token: token.map(Zeroizing::new),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn deliver(
        client: reqwest::Client,
        url: String,
        token: Option<Zeroizing<String>>,
        draft: BidDraft,
    ) -> BidResult<()> {
        let mut request = client.post(&url).json(&draft);
        if let Some(token) = token.as_ref() {
            request = request.bearer_auth(token.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| BidError::Webhook(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BidError::Webhook(format!("{status}: {body}")));
        }
        Ok(())
    }
}

impl BidSink for WebhookBidSink {
    fn bid_created(&self, session_id: &str, draft: BidDraft) {
        let client = self.client.clone();
        let url = self.url.clone();
        let token = self.token.clone();
        let session_id = session_id.to_string();

        tokio::spawn(async move {
            let name = draft.name.clone();
            match Self::deliver(client, url, token, draft).await {
                Ok(()) => debug!(session_id = %session_id, name = %name, "Bid draft delivered"),
                Err(e) => error!(session_id = %session_id, name = %name, "Bid webhook failed: {}", e),
            }
        });
    }
}
