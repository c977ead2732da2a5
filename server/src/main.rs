//! `rtc-server` - Transport Probe
//!
//! Starts the WebRTC manager against an idle producer, builds one peer and
//! prints the offer followed by every gathered ICE candidate. Used to check
//! port range, NAT mapping and ICE server settings on a host.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use tokio::time::timeout;
use tracing::info;

use rtc_server::config::WebRtcConfig;
use rtc_server::observability;
use rtc_server::rtc::{FrameConsumer, FrameProducer, MessageHandler, SessionRegistry, WebRtcManager};
use rtc_server::session_store::{SessionManager, SignalEvent};

#[derive(Debug, Parser)]
#[command(name = "rtc-server", version, about = "Build one WebRTC peer and print its offer")]
struct Args {
    /// Viewer id of the probe peer.
    #[arg(long, default_value = "probe")]
    viewer: String,

    /// Audio codec announced by the idle producer.
    #[arg(long, default_value = "Opus")]
    audio_codec: String,

    /// Video codec announced by the idle producer.
    #[arg(long, default_value = "VP8")]
    video_codec: String,

    /// Seconds to wait for ICE candidates.
    #[arg(long, default_value_t = 3)]
    gather_secs: u64,
}

/// Producer that announces codecs but never emits frames.
struct IdleProducer {
    audio_codec: String,
    video_codec: String,
}

impl FrameProducer for IdleProducer {
    fn audio_codec_name(&self) -> String {
        self.audio_codec.clone()
    }

    fn video_codec_name(&self) -> String {
        self.video_codec.clone()
    }

    fn on_audio_frame(&self, _consumer: FrameConsumer) {}

    fn on_video_frame(&self, _consumer: FrameConsumer) {}
}

/// Logs control-channel traffic instead of acting on it.
struct LogHandler;

impl MessageHandler for LogHandler {
    fn handle(&self, viewer_id: &str, data: Bytes) -> Result<()> {
        info!(viewer_id = %viewer_id, bytes = data.len(), "Control message received");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Required before any DTLS handshake
    let _ =
        rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider());

    observability::init_tracing(observability::DEFAULT_FILTER);

    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = WebRtcConfig::from_env().context("failed to load WebRTC configuration")?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting rtc-server probe");

    let (sessions, mut signals) = SessionManager::new();
    let manager = WebRtcManager::new(
        config,
        Arc::clone(&sessions) as Arc<dyn SessionRegistry>,
        Arc::new(IdleProducer {
            audio_codec: args.audio_codec,
            video_codec: args.video_codec,
        }),
        Arc::new(LogHandler),
    );
    manager.start().context("failed to start WebRTC manager")?;

    let session = sessions.create(&args.viewer);
    let offer = manager
        .create_peer(&args.viewer, session)
        .await
        .context("failed to create peer")?;
    println!("{}", serde_json::to_string(&offer)?);

    let gather = Duration::from_secs(args.gather_secs);
    while let Ok(Some(event)) = timeout(gather, signals.recv()).await {
        let SignalEvent::Candidate { candidate, .. } = event;
        println!("{candidate}");
    }

    if let Some(peer) = sessions.get(&args.viewer).and_then(|s| s.peer()) {
        peer.close().await.context("failed to close probe peer")?;
    }
    sessions.destroy(&args.viewer);
    manager.shutdown();
    Ok(())
}
