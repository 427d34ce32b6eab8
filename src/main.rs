use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use axum_server::tls_rustls::RustlsConfig;
use clap::{Parser, Subcommand};
use http::{
    Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing_subscriber::EnvFilter;

use anyhow::anyhow;

use voice_bid_relay::{
    ServerConfig, TransportSession, UiEvent,
    client::{MessageCallback, SessionAudio, SpeakingCallback},
    core::audio::{
        AudioCaptureEncoder, DefaultAudioSink, DefaultCaptureBackend, PlaybackQueue,
    },
    state::AppState,
};

/// Voice Bid Relay - realtime voice relay with structured bid extraction
#[derive(Parser, Debug)]
#[command(name = "voice-bid-relay")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run (defaults to `serve`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the relay server
    Serve,

    /// Talk to a relay from the terminal
    Talk {
        /// Relay WebSocket URL
        #[arg(short = 'u', long = "url", default_value = "ws://127.0.0.1:3001/realtime-chat")]
        url: String,

        /// Do not capture the microphone; type messages instead
        #[arg(long = "no-mic")]
        no_mic: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Must be installed before any TLS connection is attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(cli.config).await,
        Commands::Talk { url, no_mic } => talk(&url, !no_mic).await,
    }
}

async fn serve(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = if let Some(config_path) = config_path {
        println!("Loading configuration from {}", config_path.display());
        ServerConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    let address = config.address();
    let tls_config = config.tls.clone();
    let cors_origins = config.cors_allowed_origins.clone();
    println!("Starting server on {address}");

    let app_state = AppState::new(config);

    let cors_layer = if let Some(ref origins) = cors_origins {
        if origins == "*" {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_credentials(false)
        } else {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_credentials(true)
        }
    } else {
        info!(
            "CORS not configured, defaulting to same-origin only. \
             Set CORS_ALLOWED_ORIGINS to enable cross-origin access."
        );
        CorsLayer::new()
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE])
            .allow_credentials(false)
    };

    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_CONTENT_TYPE_OPTIONS,
            http::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_FRAME_OPTIONS,
            http::HeaderValue::from_static("DENY"),
        ));

    let app = voice_bid_relay::app(app_state)
        .layer(cors_layer)
        .layer(security_headers);

    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    if let Some(tls) = tls_config {
        let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to load TLS certificates from {} and {}: {}",
                    tls.cert_path.display(),
                    tls.key_path.display(),
                    e
                )
            })?;

        println!("Server listening on https://{} (TLS enabled)", socket_addr);

        axum_server::bind_rustls(socket_addr, rustls_config)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|e| anyhow!("TLS server error: {}", e))?;
    } else {
        println!("Server listening on http://{}", socket_addr);

        let listener = TcpListener::bind(&socket_addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
    }

    Ok(())
}

fn print_event(event: UiEvent) {
    match event {
        UiEvent::Connected => println!("* connected"),
        UiEvent::Disconnected => println!("* disconnected"),
        UiEvent::Transcript { role, text } => println!("[{role}] {text}"),
        UiEvent::BidCreated { bid_data } => println!("* bid created: {bid_data}"),
        UiEvent::FunctionCall { name, call_id, .. } => println!("* {name} ({call_id})"),
        UiEvent::Error { message } => eprintln!("! {message}"),
        UiEvent::ServerEvent(_) => {}
    }
}

async fn talk(url: &str, capture: bool) -> anyhow::Result<()> {
    let playback = match DefaultAudioSink::new() {
        Ok(sink) => Some(PlaybackQueue::new(Arc::new(sink))),
        Err(e) => {
            warn!("Audio playback unavailable: {}", e);
            None
        }
    };
    let encoder = (capture && cfg!(feature = "capture-cpal"))
        .then(|| AudioCaptureEncoder::new(Box::new(DefaultCaptureBackend::new())));
    if capture && encoder.is_none() {
        warn!("Built without microphone support, type messages instead");
    }

    let on_message: MessageCallback = Arc::new(print_event);
    let on_speaking: SpeakingCallback = Arc::new(|speaking| {
        if speaking {
            println!("* assistant speaking");
        }
    });

    let session = TransportSession::new(SessionAudio { playback, encoder }, on_message, on_speaking);
    session
        .connect(url)
        .await
        .map_err(|e| anyhow!("Failed to start session: {}", e))?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) if line.trim() == "/quit" => break,
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    if let Err(e) = session.send_text(line.trim()) {
                        eprintln!("! {e}");
                        break;
                    }
                }
                None => break,
            },
        }
    }

    session.disconnect();
    Ok(())
}
