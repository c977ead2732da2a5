//! Reusable test helpers for peer factory integration tests.
//!
//! Provides recording doubles for every collaborator of `WebRtcManager`,
//! plus a stand-in browser that answers offers with a plain webrtc-rs stack.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use anyhow::bail;
use bytes::Bytes;
use rtc_server::config::{IceServer, WebRtcConfig};
use rtc_server::rtc::{
    FrameConsumer, FrameProducer, MessageHandler, Peer, Session, SessionRegistry, WebRtcManager,
};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

static CRYPTO: Once = Once::new();

/// Install the rustls crypto provider once per test binary.
pub fn init_crypto() {
    CRYPTO.call_once(|| {
        let _ = rustls::crypto::CryptoProvider::install_default(
            rustls::crypto::ring::default_provider(),
        );
    });
}

// ============================================================================
// Collaborator doubles
// ============================================================================

/// Producer announcing fixed codec names.
pub struct TestProducer {
    pub audio: String,
    pub video: String,
}

impl TestProducer {
    pub fn new(video: &str, audio: &str) -> Self {
        Self {
            audio: audio.to_string(),
            video: video.to_string(),
        }
    }
}

impl FrameProducer for TestProducer {
    fn audio_codec_name(&self) -> String {
        self.audio.clone()
    }

    fn video_codec_name(&self) -> String {
        self.video.clone()
    }

    fn on_audio_frame(&self, _consumer: FrameConsumer) {}

    fn on_video_frame(&self, _consumer: FrameConsumer) {}
}

/// Registry recording destroyed viewer ids.
#[derive(Default)]
pub struct TestRegistry {
    destroyed: Mutex<Vec<String>>,
}

impl TestRegistry {
    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().unwrap().clone()
    }
}

impl SessionRegistry for TestRegistry {
    fn destroy(&self, viewer_id: &str) {
        self.destroyed.lock().unwrap().push(viewer_id.to_string());
    }
}

/// Session keeping the attached peer.
#[derive(Default)]
pub struct TestSession {
    reject_peer: bool,
    set_peer_calls: AtomicUsize,
    peer: Mutex<Option<Peer>>,
    candidates: Mutex<Vec<String>>,
}

impl TestSession {
    pub fn rejecting() -> Self {
        Self {
            reject_peer: true,
            ..Self::default()
        }
    }

    pub fn set_peer_calls(&self) -> usize {
        self.set_peer_calls.load(Ordering::SeqCst)
    }

    pub fn peer(&self) -> Option<Peer> {
        self.peer.lock().unwrap().clone()
    }

    pub fn candidates(&self) -> Vec<String> {
        self.candidates.lock().unwrap().clone()
    }
}

impl Session for TestSession {
    fn set_peer(&self, peer: Peer) -> anyhow::Result<()> {
        self.set_peer_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_peer {
            bail!("viewer left before the peer was ready");
        }
        *self.peer.lock().unwrap() = Some(peer);
        Ok(())
    }

    fn set_connected(&self, _connected: bool) -> anyhow::Result<()> {
        Ok(())
    }

    fn signal_candidate(&self, candidate: String) -> anyhow::Result<()> {
        self.candidates.lock().unwrap().push(candidate);
        Ok(())
    }
}

/// Handler recording every control message.
#[derive(Default)]
pub struct TestHandler {
    received: Mutex<Vec<(String, Bytes)>>,
}

impl MessageHandler for TestHandler {
    fn handle(&self, viewer_id: &str, data: Bytes) -> anyhow::Result<()> {
        self.received
            .lock()
            .unwrap()
            .push((viewer_id.to_string(), data));
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn stun_servers() -> Vec<IceServer> {
    vec![
        IceServer {
            urls: vec!["stun:stun1.example.org:3478".into()],
            username: None,
            credential: None,
        },
        IceServer {
            urls: vec!["stun:stun2.example.org:3478".into()],
            username: None,
            credential: None,
        },
    ]
}

pub struct TestManager {
    pub manager: WebRtcManager,
    pub registry: Arc<TestRegistry>,
    pub handler: Arc<TestHandler>,
}

/// Build and start a manager with the given config and codecs.
pub fn started_manager(config: WebRtcConfig, video: &str, audio: &str) -> TestManager {
    init_crypto();
    let registry = Arc::new(TestRegistry::default());
    let handler = Arc::new(TestHandler::default());
    let manager = WebRtcManager::new(
        config,
        registry.clone(),
        Arc::new(TestProducer::new(video, audio)),
        handler.clone(),
    );
    manager.start().expect("manager should start");

    TestManager {
        manager,
        registry,
        handler,
    }
}

/// SDP lines of the m-section for `kind` ("video", "audio", "application").
pub fn media_section<'a>(sdp: &'a str, kind: &str) -> Vec<&'a str> {
    let header = format!("m={kind} ");
    sdp.lines()
        .skip_while(|line| !line.starts_with(&header))
        .enumerate()
        .take_while(|(i, line)| *i == 0 || !line.starts_with("m="))
        .map(|(_, line)| line)
        .collect()
}

// ============================================================================
// Browser stand-in
// ============================================================================

/// Plain webrtc-rs peer answering offers the way a browser would.
pub async fn browser() -> Arc<RTCPeerConnection> {
    init_crypto();
    let mut engine = MediaEngine::default();
    engine.register_default_codecs().unwrap();
    let registry = register_default_interceptors(Registry::new(), &mut engine).unwrap();
    let api = APIBuilder::new()
        .with_media_engine(engine)
        .with_interceptor_registry(registry)
        .build();

    Arc::new(
        api.new_peer_connection(RTCConfiguration::default())
            .await
            .unwrap(),
    )
}

/// Apply `offer_sdp` to `browser` and return its answer SDP.
pub async fn answer(browser: &RTCPeerConnection, offer_sdp: &str) -> String {
    let offer = RTCSessionDescription::offer(offer_sdp.to_string()).unwrap();
    browser.set_remote_description(offer).await.unwrap();
    let answer = browser.create_answer(None).await.unwrap();
    let sdp = answer.sdp.clone();
    browser.set_local_description(answer).await.unwrap();
    sdp
}
