//! Transport-neutral frames and the adapters that bind them to sockets.
//!
//! Both legs of a relay session, the axum client socket and the tungstenite
//! upstream socket, are reduced to a [`Leg`]: a sink of [`RelayFrame`]s and a
//! stream of [`LegEvent`]s. The bridge loop never sees socket types.

use std::pin::Pin;

use axum::extract::ws::{Message as AxumMessage, WebSocket};
use bytes::Bytes;
use futures::future;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::RelayError;

/// A data frame forwarded between legs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    Text(String),
    Binary(Bytes),
}

impl RelayFrame {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Something that happened on one leg.
#[derive(Debug, Clone, PartialEq)]
pub enum LegEvent {
    Frame(RelayFrame),
    Closed,
    Error(String),
    /// Control traffic (ping/pong) the bridge does not act on
    Ignored,
}

pub type LegSink = Pin<Box<dyn Sink<RelayFrame, Error = RelayError> + Send>>;
pub type LegStream = Pin<Box<dyn Stream<Item = LegEvent> + Send>>;

/// One side of a relay session.
pub struct Leg {
    pub sink: LegSink,
    pub stream: LegStream,
}

impl Leg {
    pub fn new(sink: LegSink, stream: LegStream) -> Self {
        Self { sink, stream }
    }
}

// =============================================================================
// axum (client leg)
// =============================================================================

fn from_axum(message: Result<AxumMessage, axum::Error>) -> LegEvent {
    match message {
        Ok(AxumMessage::Text(text)) => LegEvent::Frame(RelayFrame::Text(text.as_str().to_owned())),
        Ok(AxumMessage::Binary(data)) => LegEvent::Frame(RelayFrame::Binary(data)),
        Ok(AxumMessage::Close(_)) => LegEvent::Closed,
        Ok(AxumMessage::Ping(_)) | Ok(AxumMessage::Pong(_)) => LegEvent::Ignored,
        Err(e) => LegEvent::Error(e.to_string()),
    }
}

fn to_axum(frame: RelayFrame) -> AxumMessage {
    match frame {
        RelayFrame::Text(text) => AxumMessage::Text(text.into()),
        RelayFrame::Binary(data) => AxumMessage::Binary(data),
    }
}

/// Wrap an upgraded client socket.
pub fn client_leg(socket: WebSocket) -> Leg {
    let (sink, stream) = socket.split();
    let sink = sink
        .sink_map_err(|e| RelayError::Transport(e.to_string()))
        .with(|frame: RelayFrame| future::ready(Ok::<_, RelayError>(to_axum(frame))));
    Leg::new(Box::pin(sink), Box::pin(stream.map(from_axum)))
}

// =============================================================================
// tokio-tungstenite (upstream leg)
// =============================================================================

fn from_tungstenite(
    message: Result<TungsteniteMessage, tokio_tungstenite::tungstenite::Error>,
) -> LegEvent {
    match message {
        Ok(TungsteniteMessage::Text(text)) => {
            LegEvent::Frame(RelayFrame::Text(text.as_str().to_owned()))
        }
        Ok(TungsteniteMessage::Binary(data)) => LegEvent::Frame(RelayFrame::Binary(data)),
        Ok(TungsteniteMessage::Close(_)) => LegEvent::Closed,
        Ok(_) => LegEvent::Ignored,
        Err(e) => LegEvent::Error(e.to_string()),
    }
}

fn to_tungstenite(frame: RelayFrame) -> TungsteniteMessage {
    match frame {
        RelayFrame::Text(text) => TungsteniteMessage::Text(text.into()),
        RelayFrame::Binary(data) => TungsteniteMessage::Binary(data),
    }
}

/// Wrap a connected upstream socket.
pub fn upstream_leg(socket: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Leg {
    let (sink, stream) = socket.split();
    let sink = sink
        .sink_map_err(|e| RelayError::Transport(e.to_string()))
        .with(|frame: RelayFrame| future::ready(Ok::<_, RelayError>(to_tungstenite(frame))));
    Leg::new(Box::pin(sink), Box::pin(stream.map(from_tungstenite)))
}

/// In-memory leg backed by channels, for driving the bridge without sockets.
///
/// Returns the leg plus the peer's ends: a sender for events the leg should
/// observe and a receiver for frames written to it.
pub fn channel_leg() -> (
    Leg,
    futures::channel::mpsc::UnboundedSender<LegEvent>,
    futures::channel::mpsc::UnboundedReceiver<RelayFrame>,
) {
    let (event_tx, event_rx) = futures::channel::mpsc::unbounded::<LegEvent>();
    let (frame_tx, frame_rx) = futures::channel::mpsc::unbounded::<RelayFrame>();
    let sink = frame_tx.sink_map_err(|e| RelayError::Transport(e.to_string()));
    (
        Leg::new(Box::pin(sink), Box::pin(event_rx)),
        event_tx,
        frame_rx,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tungstenite_mapping() {
        let event = from_tungstenite(Ok(TungsteniteMessage::Text("{\"a\":1}".into())));
        assert_eq!(event, LegEvent::Frame(RelayFrame::Text("{\"a\":1}".to_string())));
        assert_eq!(from_tungstenite(Ok(TungsteniteMessage::Close(None))), LegEvent::Closed);
        assert_eq!(
            from_tungstenite(Ok(TungsteniteMessage::Ping(Bytes::new()))),
            LegEvent::Ignored
        );
        assert!(matches!(
            from_tungstenite(Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)),
            LegEvent::Error(_)
        ));
    }

    #[test]
    fn test_axum_mapping() {
        let event = from_axum(Ok(AxumMessage::Binary(Bytes::from_static(b"pcm"))));
        assert_eq!(event, LegEvent::Frame(RelayFrame::Binary(Bytes::from_static(b"pcm"))));
        assert_eq!(from_axum(Ok(AxumMessage::Close(None))), LegEvent::Closed);
        assert!(matches!(to_axum(RelayFrame::Text("x".into())), AxumMessage::Text(t) if t.as_str() == "x"));
    }

    #[tokio::test]
    async fn test_channel_leg_round_trip() {
        let (mut leg, events, mut frames) = channel_leg();

        leg.sink.send(RelayFrame::Text("out".into())).await.unwrap();
        assert_eq!(frames.next().await, Some(RelayFrame::Text("out".into())));

        events.unbounded_send(LegEvent::Closed).unwrap();
        assert_eq!(leg.stream.next().await, Some(LegEvent::Closed));
    }
}
