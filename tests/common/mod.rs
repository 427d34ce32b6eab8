//! Shared fixtures: an in-process realtime upstream and relay server.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_hdr_async};

use voice_bid_relay::config::ServerConfig;
use voice_bid_relay::core::realtime::openai::{RealtimeModel, RealtimeVoice};
use voice_bid_relay::state::AppState;

pub const TEST_API_KEY: &str = "sk-test-key";
pub const WAIT: Duration = Duration::from_secs(5);

/// What the test wants the upstream to do next.
pub enum UpstreamCommand {
    Send(String),
    /// Send a close frame and hang up
    Close,
    /// Drop the socket without a close frame
    Abort,
}

/// One accepted upstream connection.
pub struct UpstreamConnection {
    pub path_and_query: String,
    pub authorization: Option<String>,
    pub openai_beta: Option<String>,
    /// Text frames the relay sent upstream, in order; ends when the socket closes
    pub received: mpsc::UnboundedReceiver<String>,
    pub commands: mpsc::UnboundedSender<UpstreamCommand>,
}

impl UpstreamConnection {
    pub async fn next_text(&mut self) -> Option<String> {
        tokio::time::timeout(WAIT, self.received.recv())
            .await
            .expect("timed out waiting for upstream frame")
    }

    pub async fn next_json(&mut self) -> serde_json::Value {
        let text = self.next_text().await.expect("upstream connection closed");
        serde_json::from_str(&text).expect("upstream frame is not JSON")
    }

    pub fn send(&self, text: impl Into<String>) {
        let _ = self.commands.send(UpstreamCommand::Send(text.into()));
    }
}

/// Mock of the realtime service.
pub struct MockUpstream {
    pub url: String,
    connections: mpsc::UnboundedReceiver<UpstreamConnection>,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let conn_tx = conn_tx.clone();
                tokio::spawn(async move {
                    let (headers_tx, headers_rx) = std::sync::mpsc::channel();
                    let callback = move |request: &Request,
                                         response: Response|
                          -> Result<Response, ErrorResponse> {
                        let header = |name: &str| {
                            request
                                .headers()
                                .get(name)
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_string)
                        };
                        let _ = headers_tx.send((
                            request
                                .uri()
                                .path_and_query()
                                .map(|p| p.to_string())
                                .unwrap_or_default(),
                            header("authorization"),
                            header("openai-beta"),
                        ));
                        Ok(response)
                    };
                    let Ok(socket) = accept_hdr_async(stream, callback).await else {
                        return;
                    };
                    let Ok((path_and_query, authorization, openai_beta)) = headers_rx.recv() else {
                        return;
                    };

                    let (received_tx, received_rx) = mpsc::unbounded_channel();
                    let (command_tx, mut command_rx) = mpsc::unbounded_channel();
                    let _ = conn_tx.send(UpstreamConnection {
                        path_and_query,
                        authorization,
                        openai_beta,
                        received: received_rx,
                        commands: command_tx,
                    });

                    let (mut write, mut read) = socket.split();
                    loop {
                        tokio::select! {
                            message = read.next() => match message {
                                Some(Ok(Message::Text(text))) => {
                                    let _ = received_tx.send(text.to_string());
                                }
                                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                                Some(Ok(_)) => {}
                            },
                            command = command_rx.recv() => match command {
                                Some(UpstreamCommand::Send(text)) => {
                                    if write.send(Message::Text(text.into())).await.is_err() {
                                        break;
                                    }
                                }
                                Some(UpstreamCommand::Close) => {
                                    let _ = write.send(Message::Close(None)).await;
                                    break;
                                }
                                Some(UpstreamCommand::Abort) | None => break,
                            },
                        }
                    }
                });
            }
        });

        Self {
            url: format!("ws://{addr}/v1/realtime"),
            connections: conn_rx,
        }
    }

    pub async fn accept(&mut self) -> UpstreamConnection {
        tokio::time::timeout(WAIT, self.connections.recv())
            .await
            .expect("timed out waiting for upstream connection")
            .expect("mock upstream stopped")
    }
}

pub fn test_config(realtime_url: &str, api_key: Option<&str>) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: None,
        openai_api_key: api_key.map(str::to_string),
        realtime_url: realtime_url.to_string(),
        realtime_model: RealtimeModel::default(),
        realtime_voice: RealtimeVoice::default(),
        upstream_connect_timeout_seconds: 10,
        bid_webhook_url: None,
        bid_webhook_token: None,
        cors_allowed_origins: None,
    }
}

/// Serve the relay on an ephemeral port; returns the `/realtime-chat` URL.
pub async fn spawn_relay(state: Arc<AppState>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, voice_bid_relay::app(state)).await.unwrap();
    });
    format!("ws://{addr}/realtime-chat")
}

pub type ClientSocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub async fn connect_client(url: &str) -> ClientSocket {
    let (socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    socket
}

/// Next text frame on a client socket; `None` once the relay closes it.
pub async fn client_next_text(socket: &mut ClientSocket) -> Option<String> {
    loop {
        let message = tokio::time::timeout(WAIT, socket.next())
            .await
            .expect("timed out waiting for relay frame");
        match message {
            Some(Ok(Message::Text(text))) => return Some(text.to_string()),
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
            Some(Ok(_)) => continue,
        }
    }
}
