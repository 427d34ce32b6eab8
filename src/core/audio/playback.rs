//! Sequential playback of inbound audio fragments.
//!
//! Fragments are queued in arrival order and drained by a single blocking
//! worker, so exactly one fragment plays at a time. The worker exits when the
//! queue runs dry; the next `enqueue` starts a new one.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::AudioResult;
use super::wav::decode_fragment;

/// Output device for decoded audio.
pub trait AudioSink: Send + Sync {
    /// Play 24kHz mono samples.
    ///
    /// Returns once the samples have been played or handed to a device
    /// buffer; consecutive calls must sound back to back.
    fn play(&self, samples: &[f32]) -> AudioResult<()>;

    /// Release the output device.
    fn close(&self) {}
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Bytes>,
    playing: bool,
    closed: bool,
}

struct PlaybackInner {
    state: Mutex<QueueState>,
    idle: Notify,
    sink: Arc<dyn AudioSink>,
}

impl PlaybackInner {
    fn drain(&self) {
        loop {
            let fragment = {
                let mut state = self.state.lock();
                match state.pending.pop_front() {
                    Some(fragment) if !state.closed => fragment,
                    _ => {
                        state.playing = false;
                        drop(state);
                        self.idle.notify_waiters();
                        return;
                    }
                }
            };

            match decode_fragment(&fragment) {
                Ok(samples) => {
                    if let Err(e) = self.sink.play(&samples) {
                        warn!("Audio playback failed: {}", e);
                    }
                }
                Err(e) => {
                    warn!(bytes = fragment.len(), "Dropping undecodable audio fragment: {}", e);
                }
            }
        }
    }
}

/// Ordered, unbounded queue of PCM16 fragments awaiting playback.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct PlaybackQueue {
    inner: Arc<PlaybackInner>,
}

impl PlaybackQueue {
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self {
            inner: Arc::new(PlaybackInner {
                state: Mutex::new(QueueState::default()),
                idle: Notify::new(),
                sink,
            }),
        }
    }

    /// Append a raw PCM16 fragment and start playback if idle.
    ///
    /// Must be called from within a Tokio runtime. No-op after `close()`.
    pub fn enqueue(&self, fragment: Bytes) {
        let start_worker = {
            let mut state = self.inner.state.lock();
            if state.closed {
                debug!("Ignoring audio fragment for closed playback queue");
                return;
            }
            state.pending.push_back(fragment);
            !std::mem::replace(&mut state.playing, true)
        };

        if start_worker {
            let inner = self.inner.clone();
            tokio::task::spawn_blocking(move || inner.drain());
        }
    }

    /// Drop pending fragments and release the sink. Idempotent.
    pub fn close(&self) {
        let was_open = {
            let mut state = self.inner.state.lock();
            state.pending.clear();
            !std::mem::replace(&mut state.closed, true)
        };
        if was_open {
            self.inner.sink.close();
            debug!("Playback queue closed");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.inner.state.lock().playing
    }

    pub fn pending(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Wait until the queue has nothing left to play.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_playing() {
                return;
            }
            notified.await;
        }
    }
}
