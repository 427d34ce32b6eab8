//! Upstream connection to the OpenAI Realtime API.

use async_trait::async_trait;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tracing::{debug, info};
use url::Url;
use zeroize::Zeroizing;

use super::config::{OPENAI_BETA_HEADER, RealtimeModel, build_ws_url};
use crate::core::realtime::{RealtimeError, RealtimeResult};
use crate::core::relay::{Leg, UpstreamConnector, upstream_leg};

/// Opens authenticated sockets to the realtime endpoint.
///
/// The API key is held in zeroizing memory and only ever placed in the
/// `Authorization` header of the upgrade request.
pub struct OpenAIUpstream {
    url: Url,
    api_key: Zeroizing<String>,
}

impl OpenAIUpstream {
    pub fn new(base_url: &str, model: RealtimeModel, api_key: impl Into<String>) -> RealtimeResult<Self> {
        let api_key = Zeroizing::new(api_key.into());
        if api_key.trim().is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "API key is required".to_string(),
            ));
        }

        Ok(Self {
            url: build_ws_url(base_url, model)?,
            api_key,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl std::fmt::Debug for OpenAIUpstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIUpstream")
            .field("url", &self.url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl UpstreamConnector for OpenAIUpstream {
    async fn connect(&self) -> RealtimeResult<Leg> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let authorization = HeaderValue::from_str(&format!("Bearer {}", self.api_key.as_str()))
            .map_err(|_| {
                RealtimeError::InvalidConfiguration("API key is not a valid header value".to_string())
            })?;
        let headers = request.headers_mut();
        headers.insert("Authorization", authorization);
        headers.insert("OpenAI-Beta", HeaderValue::from_static(OPENAI_BETA_HEADER));

        debug!(url = %self.url, "Connecting to realtime service");
        let (socket, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        info!("Connected to OpenAI Realtime API");
        Ok(upstream_leg(socket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::openai::OPENAI_REALTIME_URL;

    #[test]
    fn test_requires_api_key() {
        let result = OpenAIUpstream::new(OPENAI_REALTIME_URL, RealtimeModel::default(), "  ");
        assert!(matches!(result, Err(RealtimeError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let upstream =
            OpenAIUpstream::new(OPENAI_REALTIME_URL, RealtimeModel::default(), "sk-secret").unwrap();
        let rendered = format!("{upstream:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("model=gpt-4o-realtime-preview-2024-10-01"));
    }

    #[test]
    fn test_rejects_http_url() {
        let result = OpenAIUpstream::new("https://api.openai.com/v1/realtime", RealtimeModel::default(), "k");
        assert!(result.is_err());
    }
}
