//! Client transport session.
//!
//! Lifecycle: `idle -> connecting -> open -> closing -> closed`. A session
//! is single use; once closed, build a new one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::dispatch::{SessionDispatcher, SessionOutput};
use super::events::{MessageCallback, SpeakingCallback, UiEvent};
use super::{TransportError, TransportResult};
use crate::core::audio::{AudioCaptureEncoder, FrameCallback, PlaybackQueue};
use crate::core::realtime::ConnectionState;
use crate::core::realtime::openai::ClientEvent;

/// Optional audio attached to a session.
#[derive(Default)]
pub struct SessionAudio {
    /// Receives assistant audio fragments
    pub playback: Option<PlaybackQueue>,
    /// Streams microphone frames once connected
    pub encoder: Option<AudioCaptureEncoder>,
}

enum Outbound {
    Text(String),
    Close,
}

struct Shared {
    /// Serializes connection commit against teardown; reentrant so
    /// callbacks may disconnect from inside either.
    lifecycle: ReentrantMutex<()>,
    state: RwLock<ConnectionState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
    disconnected: AtomicBool,
    dispatcher: Mutex<SessionDispatcher>,
    playback: Option<PlaybackQueue>,
    encoder: Option<Arc<AudioCaptureEncoder>>,
    on_message: MessageCallback,
    on_speaking: SpeakingCallback,
    cancel: CancellationToken,
}

impl Shared {
    fn dispatch(&self, text: &str) {
        let outputs = self.dispatcher.lock().handle_inbound(text);
        for output in outputs {
            match output {
                SessionOutput::SpeakingChanged(speaking) => (self.on_speaking)(speaking),
                SessionOutput::Play(fragment) => {
                    if let Some(playback) = &self.playback {
                        playback.enqueue(fragment);
                    }
                }
                SessionOutput::Event(event) => (self.on_message)(event),
            }
        }
    }

    /// Release everything and emit the single `Disconnected`.
    fn teardown(&self) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }
        let _lifecycle = self.lifecycle.lock();
        *self.state.write() = ConnectionState::Closing;

        if let Some(encoder) = &self.encoder {
            encoder.stop();
        }
        if let Some(tx) = self.outbound.lock().take() {
            let _ = tx.send(Outbound::Close);
        }
        if let Some(playback) = &self.playback {
            playback.close();
        }
        self.cancel.cancel();

        let was_speaking = self.dispatcher.lock().reset();
        if was_speaking {
            (self.on_speaking)(false);
        }

        *self.state.write() = ConnectionState::Closed;
        info!("Session disconnected");
        (self.on_message)(UiEvent::Disconnected);
    }
}

type SocketSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type SocketStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

async fn write_loop(mut sink: SocketSink, mut rx: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(outbound) = rx.recv().await {
        match outbound {
            Outbound::Text(text) => {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    debug!("Outbound send failed: {}", e);
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    let _ = sink.close().await;
}

async fn read_loop(shared: Arc<Shared>, mut stream: SocketStream) {
    loop {
        let message = tokio::select! {
            _ = shared.cancel.cancelled() => break,
            message = stream.next() => message,
        };
        match message {
            Some(Ok(Message::Text(text))) => shared.dispatch(text.as_str()),
            Some(Ok(Message::Binary(data))) => {
                debug!(bytes = data.len(), "Ignoring binary frame");
            }
            Some(Ok(Message::Close(_))) | None => {
                info!("Server closed the connection");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("Connection error: {}", e);
                if !shared.disconnected.load(Ordering::SeqCst) {
                    (shared.on_message)(UiEvent::error(format!("Connection error: {e}")));
                }
                break;
            }
        }
    }
    shared.teardown();
}

/// One duplex voice session with the relay.
pub struct TransportSession {
    shared: Arc<Shared>,
}

impl TransportSession {
    pub fn new(audio: SessionAudio, on_message: MessageCallback, on_speaking: SpeakingCallback) -> Self {
        Self {
            shared: Arc::new(Shared {
                lifecycle: ReentrantMutex::new(()),
                state: RwLock::new(ConnectionState::Idle),
                outbound: Mutex::new(None),
                disconnected: AtomicBool::new(false),
                dispatcher: Mutex::new(SessionDispatcher::new()),
                playback: audio.playback,
                encoder: audio.encoder.map(Arc::new),
                on_message,
                on_speaking,
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    pub fn is_speaking(&self) -> bool {
        self.shared.dispatcher.lock().is_speaking()
    }

    /// Open the channel, emit `Connected` and start streaming the microphone.
    ///
    /// A failure to open the socket or start capture ends the session with
    /// an `Error` event followed by `Disconnected`. If `disconnect()` runs
    /// while the socket is still opening, the socket is closed as soon as it
    /// opens and `NotConnected` is returned.
    pub async fn connect(&self, url: &str) -> TransportResult<()> {
        {
            let mut state = self.shared.state.write();
            if *state != ConnectionState::Idle {
                return Err(TransportError::AlreadyConnected);
            }
            *state = ConnectionState::Connecting;
        }

        let socket = match tokio_tungstenite::connect_async(url).await {
            Ok((socket, _response)) => socket,
            Err(e) if self.shared.disconnected.load(Ordering::SeqCst) => {
                debug!(url = %url, "Connect abandoned after disconnect: {}", e);
                return Err(TransportError::NotConnected);
            }
            Err(e) => {
                error!(url = %url, "Failed to connect: {}", e);
                (self.shared.on_message)(UiEvent::error(format!("Connection error: {e}")));
                self.shared.teardown();
                return Err(TransportError::Connection(e.to_string()));
            }
        };

        let (sink, stream) = socket.split();
        let committed = {
            let _lifecycle = self.shared.lifecycle.lock();
            if self.shared.disconnected.load(Ordering::SeqCst) {
                Err(sink)
            } else {
                let (tx, rx) = mpsc::unbounded_channel::<Outbound>();
                *self.shared.outbound.lock() = Some(tx.clone());
                *self.shared.state.write() = ConnectionState::Open;
                info!(url = %url, "Session connected");
                (self.shared.on_message)(UiEvent::Connected);

                tokio::spawn(write_loop(sink, rx));
                tokio::spawn(read_loop(self.shared.clone(), stream));
                Ok(self.start_capture(tx))
            }
        };

        match committed {
            Ok(capture) => capture,
            Err(mut sink) => {
                debug!(url = %url, "Disconnected while connecting, closing socket");
                let _ = sink.close().await;
                Err(TransportError::NotConnected)
            }
        }
    }

    /// Runs under the lifecycle lock, so a concurrent teardown waits for it.
    fn start_capture(&self, tx: mpsc::UnboundedSender<Outbound>) -> TransportResult<()> {
        let Some(encoder) = &self.shared.encoder else {
            return Ok(());
        };
        let on_frame: FrameCallback = Arc::new(move |frame: &[f32]| {
            match serde_json::to_string(&ClientEvent::audio_append(frame)) {
                Ok(json) => {
                    let _ = tx.send(Outbound::Text(json));
                }
                Err(e) => warn!("Failed to encode audio frame: {}", e),
            }
        });
        if let Err(e) = encoder.start(on_frame) {
            (self.shared.on_message)(UiEvent::error(e.to_string()));
            self.shared.teardown();
            return Err(e.into());
        }
        Ok(())
    }

    /// Serialize and transmit one event.
    pub fn send(&self, event: &ClientEvent) -> TransportResult<()> {
        if self.state() != ConnectionState::Open {
            return Err(TransportError::NotConnected);
        }
        let json = serde_json::to_string(event)?;
        let outbound = self.shared.outbound.lock();
        let tx = outbound.as_ref().ok_or(TransportError::NotConnected)?;
        tx.send(Outbound::Text(json))
            .map_err(|_| TransportError::NotConnected)
    }

    pub fn send_audio(&self, samples: &[f32]) -> TransportResult<()> {
        self.send(&ClientEvent::audio_append(samples))
    }

    /// Send a typed user turn and ask for a response.
    pub fn send_text(&self, text: &str) -> TransportResult<()> {
        self.send(&ClientEvent::user_text(text))?;
        self.send(&ClientEvent::ResponseCreate)
    }

    /// Stop capture, close the channel and playback. Idempotent.
    pub fn disconnect(&self) {
        self.shared.teardown();
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        if *self.shared.state.read() != ConnectionState::Idle {
            self.shared.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (MessageCallback, SpeakingCallback, Arc<Mutex<Vec<UiEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        (
            Arc::new(move |event| sink.lock().push(event)),
            Arc::new(|_| {}),
            events,
        )
    }

    #[test]
    fn test_sends_before_connect_fail() {
        let (on_message, on_speaking, _) = recorder();
        let session = TransportSession::new(SessionAudio::default(), on_message, on_speaking);

        let failures = (0..10)
            .map(|_| session.send_audio(&[0.0; 16]))
            .filter(|r| matches!(r, Err(TransportError::NotConnected)))
            .count();
        assert_eq!(failures, 10);
        assert!(matches!(session.send_text("hi"), Err(TransportError::NotConnected)));
    }

    #[test]
    fn test_disconnect_before_connect_emits_once() {
        let (on_message, on_speaking, events) = recorder();
        let session = TransportSession::new(SessionAudio::default(), on_message, on_speaking);

        session.disconnect();
        session.disconnect();

        assert_eq!(*events.lock(), vec![UiEvent::Disconnected]);
        assert_eq!(session.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_connect_failure_reports_error_then_disconnected() {
        let (on_message, on_speaking, events) = recorder();
        let session = TransportSession::new(SessionAudio::default(), on_message, on_speaking);

        let result = session.connect("ws://127.0.0.1:1/realtime-chat").await;
        assert!(matches!(result, Err(TransportError::Connection(_))));

        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], UiEvent::Error { message } if message.starts_with("Connection error")));
        assert_eq!(events[1], UiEvent::Disconnected);
        drop(events);

        assert!(matches!(
            session.connect("ws://127.0.0.1:1/").await,
            Err(TransportError::AlreadyConnected)
        ));
    }
}
