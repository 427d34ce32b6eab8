pub mod audio;
pub mod bid;
pub mod realtime;
pub mod relay;

pub use audio::{AudioCaptureEncoder, AudioError, AudioSink, PlaybackQueue};
pub use bid::{BidDraft, BidSink};
pub use realtime::{ConnectionState, RealtimeError, RealtimeResult};
pub use relay::{RelayBridge, UpstreamConnector, run_bridge};
