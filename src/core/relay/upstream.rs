//! Seam between the relay loop and whatever opens the upstream socket.

use async_trait::async_trait;

use super::frame::Leg;
use crate::core::realtime::RealtimeResult;

pub use crate::core::realtime::openai::OpenAIUpstream;

/// Opens one upstream leg per relay session.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    async fn connect(&self) -> RealtimeResult<Leg>;
}
