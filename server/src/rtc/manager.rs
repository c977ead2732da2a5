//! WebRTC Manager
//!
//! Owns the shared tracks and builds one peer connection per viewer.

use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tracing::{info, info_span, warn, Instrument, Span};
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;

use super::codec::MediaKind;
use super::error::RtcError;
use super::peer::{shutdown_connection, Peer};
use super::rtcp::spawn_rtcp_drain;
use super::session::{FrameProducer, MessageHandler, Session, SessionRegistry};
use super::signaling::{CandidateSignaler, MessageDispatcher};
use super::state::ConnectionObserver;
use super::track::{create_track, spawn_frame_pump, SharedTrack};
use super::transport;
use crate::config::{IceServer, WebRtcConfig};

/// Label of the control data channel.
pub const DATA_CHANNEL_LABEL: &str = "data";

/// Stream id both ends agree on for the pre-negotiated control channel.
pub const DATA_CHANNEL_ID: u16 = 0;

/// What the caller relays to the viewer after `create_peer`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerOffer {
    /// SDP offer, already set as local description.
    pub sdp: String,
    /// Whether the server runs ICE-lite.
    pub ice_lite: bool,
    /// ICE servers the viewer should use.
    pub ice_servers: Vec<IceServer>,
}

/// Handles produced while wiring a new connection.
struct Wiring {
    data_channel: Arc<RTCDataChannel>,
    video_sender: Arc<RTCRtpSender>,
    audio_sender: Arc<RTCRtpSender>,
    sdp: String,
}

/// Shared tracks, fixed at start.
struct Media {
    video: SharedTrack,
    audio: SharedTrack,
}

/// Process-wide WebRTC orchestrator.
pub struct WebRtcManager {
    config: WebRtcConfig,
    sessions: Arc<dyn SessionRegistry>,
    capture: Arc<dyn FrameProducer>,
    handler: Arc<dyn MessageHandler>,
    media: OnceLock<Media>,
    span: Span,
}

impl WebRtcManager {
    #[must_use]
    pub fn new(
        config: WebRtcConfig,
        sessions: Arc<dyn SessionRegistry>,
        capture: Arc<dyn FrameProducer>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            config,
            sessions,
            capture,
            handler,
            media: OnceLock::new(),
            span: info_span!("webrtc"),
        }
    }

    /// Shared video track, once started.
    #[must_use]
    pub fn video_track(&self) -> Option<&SharedTrack> {
        self.media.get().map(|media| &media.video)
    }

    /// Shared audio track, once started.
    #[must_use]
    pub fn audio_track(&self) -> Option<&SharedTrack> {
        self.media.get().map(|media| &media.audio)
    }

    /// Create the shared tracks and register the frame consumers.
    ///
    /// Must be called once, from within a Tokio runtime, before any
    /// `create_peer`.
    pub fn start(&self) -> Result<(), RtcError> {
        let _entered = self.span.enter();

        if self.media.get().is_some() {
            return Err(RtcError::AlreadyStarted);
        }

        let video = resolve_track(&self.capture.video_codec_name(), MediaKind::Video)?;
        let audio = resolve_track(&self.capture.audio_codec_name(), MediaKind::Audio)?;

        self.media
            .set(Media {
                video: video.clone(),
                audio: audio.clone(),
            })
            .map_err(|_| RtcError::AlreadyStarted)?;

        self.capture.on_video_frame(spawn_frame_pump(
            MediaKind::Video,
            video.clone(),
            self.span.clone(),
        ));
        self.capture.on_audio_frame(spawn_frame_pump(
            MediaKind::Audio,
            audio.clone(),
            self.span.clone(),
        ));

        info!(
            ice_lite = self.config.ice_lite,
            ice_servers = ?self.config.ice_servers,
            ephemeral_port_min = self.config.ephemeral_port_min,
            ephemeral_port_max = self.config.ephemeral_port_max,
            nat1to1_ips = ?self.config.nat1to1_ips,
            video_codec = video.codec().name,
            audio_codec = audio.codec().name,
            "WebRTC starting"
        );

        Ok(())
    }

    /// Tracks live for the process lifetime; nothing to release.
    pub fn shutdown(&self) {
        let _entered = self.span.enter();
        info!("WebRTC shutting down");
    }

    /// Build a peer connection for `viewer_id` and attach it to `session`.
    ///
    /// On failure the half-built connection is closed and the session is
    /// left without a peer.
    pub async fn create_peer(
        &self,
        viewer_id: &str,
        session: Arc<dyn Session>,
    ) -> Result<PeerOffer, RtcError> {
        let media = self.media.get().ok_or(RtcError::NotStarted)?;
        let span = info_span!(parent: &self.span, "peer", viewer_id = %viewer_id);

        self.build_peer(viewer_id, &session, media, &span)
            .instrument(span.clone())
            .await
    }

    async fn build_peer(
        &self,
        viewer_id: &str,
        session: &Arc<dyn Session>,
        media: &Media,
        span: &Span,
    ) -> Result<PeerOffer, RtcError> {
        let api = Arc::new(transport::build_api(
            &self.config,
            media.video.codec(),
            media.audio.codec(),
        )?);
        let configuration = transport::rtc_configuration(&self.config);
        let connection = Arc::new(api.new_peer_connection(configuration.clone()).await?);

        let wired = match self.wire_peer(viewer_id, session, media, &connection, span).await {
            Ok(wired) => wired,
            Err(e) => return Err(abandon(&connection, e).await),
        };

        let peer = Peer::new(
            viewer_id.to_string(),
            api,
            configuration,
            Arc::clone(&connection),
            wired.data_channel,
            Arc::clone(&wired.video_sender),
            Arc::clone(&wired.audio_sender),
        );
        if let Err(e) = session.set_peer(peer) {
            return Err(abandon(&connection, RtcError::Session(e.to_string())).await);
        }

        spawn_rtcp_drain(wired.video_sender, MediaKind::Video, span.clone());
        spawn_rtcp_drain(wired.audio_sender, MediaKind::Audio, span.clone());
        info!("Peer created");

        Ok(PeerOffer {
            sdp: wired.sdp,
            ice_lite: self.config.ice_lite,
            ice_servers: self.config.ice_servers.clone(),
        })
    }

    /// Data channel, observers, tracks and offer.
    async fn wire_peer(
        &self,
        viewer_id: &str,
        session: &Arc<dyn Session>,
        media: &Media,
        connection: &Arc<RTCPeerConnection>,
        span: &Span,
    ) -> Result<Wiring, RtcError> {
        let data_channel = connection
            .create_data_channel(
                DATA_CHANNEL_LABEL,
                Some(RTCDataChannelInit {
                    negotiated: Some(DATA_CHANNEL_ID),
                    ..Default::default()
                }),
            )
            .await?;

        let dispatcher = Arc::new(MessageDispatcher::new(viewer_id, Arc::clone(&self.handler)));
        let message_span = span.clone();
        data_channel.on_message(Box::new(move |msg: DataChannelMessage| {
            let dispatcher = Arc::clone(&dispatcher);
            Box::pin(async move { dispatcher.dispatch(msg) }.instrument(message_span.clone()))
        }));

        let observer = Arc::new(ConnectionObserver::new(viewer_id, session, &self.sessions));
        let ice_observer = Arc::clone(&observer);
        let state_span = span.clone();
        connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let observer = Arc::clone(&observer);
                Box::pin(async move { observer.on_state_change(state) }.instrument(state_span.clone()))
            },
        ));

        let ice_state_span = span.clone();
        connection.on_ice_connection_state_change(Box::new(
            move |state: RTCIceConnectionState| {
                let observer = Arc::clone(&ice_observer);
                Box::pin(
                    async move { observer.on_ice_state_change(state) }
                        .instrument(ice_state_span.clone()),
                )
            },
        ));

        let signaler = Arc::new(CandidateSignaler::new(viewer_id, session));
        let ice_span = span.clone();
        connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let signaler = Arc::clone(&signaler);
            Box::pin(async move { signaler.on_candidate(candidate) }.instrument(ice_span.clone()))
        }));

        let video_sender = connection.add_track(media.video.local()).await?;
        let audio_sender = connection.add_track(media.audio.local()).await?;

        let offer = connection.create_offer(None).await?;
        let sdp = offer.sdp.clone();
        connection.set_local_description(offer).await?;

        Ok(Wiring {
            data_channel,
            video_sender,
            audio_sender,
            sdp,
        })
    }
}

/// Close a half-built connection and hand back the error that stopped it.
async fn abandon(connection: &RTCPeerConnection, error: RtcError) -> RtcError {
    warn!(error = %error, "Failed to create peer");
    // Close failures are logged inside shutdown_connection.
    let _ = shutdown_connection(connection).await;
    error
}

/// Create the shared track for one slot, rejecting codecs of the wrong kind.
fn resolve_track(codec_name: &str, expected: MediaKind) -> Result<SharedTrack, RtcError> {
    let track = create_track(codec_name)?;
    if track.kind() != expected {
        return Err(RtcError::CodecKindMismatch {
            codec: codec_name.to_string(),
            expected,
        });
    }
    Ok(track)
}
