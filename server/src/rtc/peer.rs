//! Per-viewer peer connection context.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};
use webrtc::api::API;
use webrtc::data_channel::RTCDataChannel;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;

use super::error::RtcError;
use super::signaling::parse_candidate;

/// Everything the transport needs for one viewer.
///
/// Cloning is cheap; all clones refer to the same connection.
#[derive(Clone)]
pub struct Peer {
    viewer_id: String,
    api: Arc<API>,
    configuration: RTCConfiguration,
    connection: Arc<RTCPeerConnection>,
    data_channel: Arc<RTCDataChannel>,
    video_sender: Arc<RTCRtpSender>,
    audio_sender: Arc<RTCRtpSender>,
}

impl Peer {
    pub(crate) const fn new(
        viewer_id: String,
        api: Arc<API>,
        configuration: RTCConfiguration,
        connection: Arc<RTCPeerConnection>,
        data_channel: Arc<RTCDataChannel>,
        video_sender: Arc<RTCRtpSender>,
        audio_sender: Arc<RTCRtpSender>,
    ) -> Self {
        Self {
            viewer_id,
            api,
            configuration,
            connection,
            data_channel,
            video_sender,
            audio_sender,
        }
    }

    #[must_use]
    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    /// API instance (media engine, setting engine, interceptors) of this viewer.
    #[must_use]
    pub const fn api(&self) -> &Arc<API> {
        &self.api
    }

    /// Configuration the connection was created with.
    #[must_use]
    pub const fn configuration(&self) -> &RTCConfiguration {
        &self.configuration
    }

    #[must_use]
    pub const fn connection(&self) -> &Arc<RTCPeerConnection> {
        &self.connection
    }

    #[must_use]
    pub const fn video_sender(&self) -> &Arc<RTCRtpSender> {
        &self.video_sender
    }

    #[must_use]
    pub const fn audio_sender(&self) -> &Arc<RTCRtpSender> {
        &self.audio_sender
    }

    /// Apply the viewer's SDP answer.
    pub async fn signal_answer(&self, sdp: String) -> Result<(), RtcError> {
        let answer = RTCSessionDescription::answer(sdp)?;
        self.connection.set_remote_description(answer).await?;
        debug!(viewer_id = %self.viewer_id, "Applied SDP answer");
        Ok(())
    }

    /// Add a JSON-encoded ICE candidate received from the viewer.
    pub async fn add_remote_candidate(&self, json: &str) -> Result<(), RtcError> {
        let candidate = parse_candidate(json)?;
        self.connection.add_ice_candidate(candidate).await?;
        Ok(())
    }

    /// Send bytes to the viewer over the control channel.
    pub async fn send(&self, data: &Bytes) -> Result<usize, RtcError> {
        Ok(self.data_channel.send(data).await?)
    }

    /// Detach lifecycle callbacks so the connection no longer reports to
    /// its session.
    pub fn disarm(&self) {
        disarm_callbacks(&self.connection);
    }

    /// Close the connection without reporting back to the session.
    pub async fn close(&self) -> Result<(), RtcError> {
        shutdown_connection(&self.connection).await
    }
}

pub(crate) fn disarm_callbacks(connection: &RTCPeerConnection) {
    connection.on_peer_connection_state_change(Box::new(|_| Box::pin(async {})));
    connection.on_ice_connection_state_change(Box::new(|_| Box::pin(async {})));
    connection.on_ice_candidate(Box::new(|_| Box::pin(async {})));
}

/// Detach callbacks, then close.
pub(crate) async fn shutdown_connection(connection: &RTCPeerConnection) -> Result<(), RtcError> {
    disarm_callbacks(connection);
    connection.close().await.map_err(|e| {
        warn!(error = %e, "Failed to close peer connection");
        RtcError::from(e)
    })
}
