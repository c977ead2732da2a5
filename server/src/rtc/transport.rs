//! Per-viewer transport stack.
//!
//! Every viewer gets its own media engine, interceptor pipeline and setting
//! engine so that no negotiation state leaks between viewers.

use std::time::Duration;

use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice::udp_network::{EphemeralUDP, UDPNetwork};
use webrtc::ice_transport::ice_candidate_type::RTCIceCandidateType;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;

use super::codec::CodecParameters;
use super::error::RtcError;
use crate::config::WebRtcConfig;

/// Time without traffic before ICE reports `disconnected`.
pub const ICE_DISCONNECTED_TIMEOUT: Duration = Duration::from_secs(6);

/// Time without traffic before ICE reports `failed`.
pub const ICE_FAILED_TIMEOUT: Duration = Duration::from_secs(6);

/// Interval between ICE keepalive checks.
pub const ICE_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(3);

/// SRTP replay protection window, in packets.
pub const SRTP_REPLAY_WINDOW: usize = 512;

/// Media engine advertising exactly the two negotiated codecs.
pub fn media_engine(
    video: &CodecParameters,
    audio: &CodecParameters,
) -> Result<MediaEngine, RtcError> {
    let mut engine = MediaEngine::default();
    engine.register_codec(video.rtp_parameters(), video.kind.rtp_codec_type())?;
    engine.register_codec(audio.rtp_parameters(), audio.kind.rtp_codec_type())?;
    Ok(engine)
}

/// Setting engine carrying the ICE, port and SRTP settings of `config`.
pub fn setting_engine(config: &WebRtcConfig) -> Result<SettingEngine, RtcError> {
    let mut settings = SettingEngine::default();

    if config.has_port_range() {
        let ephemeral =
            EphemeralUDP::new(config.ephemeral_port_min, config.ephemeral_port_max).map_err(
                |e| {
                    RtcError::WebRtc(format!(
                        "invalid UDP port range {}-{}: {e}",
                        config.ephemeral_port_min, config.ephemeral_port_max
                    ))
                },
            )?;
        settings.set_udp_network(UDPNetwork::Ephemeral(ephemeral));
    }

    if !config.nat1to1_ips.is_empty() {
        settings.set_nat_1to1_ips(config.nat1to1_ips.clone(), RTCIceCandidateType::Host);
    }

    settings.set_ice_timeouts(
        Some(ICE_DISCONNECTED_TIMEOUT),
        Some(ICE_FAILED_TIMEOUT),
        Some(ICE_KEEPALIVE_INTERVAL),
    );
    settings.set_srtp_replay_protection_window(SRTP_REPLAY_WINDOW);

    if config.ice_lite {
        settings.set_lite(true);
    }

    Ok(settings)
}

/// Build an isolated API instance for one viewer.
pub fn build_api(
    config: &WebRtcConfig,
    video: &CodecParameters,
    audio: &CodecParameters,
) -> Result<API, RtcError> {
    let mut engine = media_engine(video, audio)?;
    let registry = register_default_interceptors(Registry::new(), &mut engine)?;
    let settings = setting_engine(config)?;

    Ok(APIBuilder::new()
        .with_media_engine(engine)
        .with_interceptor_registry(registry)
        .with_setting_engine(settings)
        .build())
}

/// Peer connection configuration. ICE-lite drops the server list.
#[must_use]
pub fn rtc_configuration(config: &WebRtcConfig) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: config.effective_ice_servers(),
        ..Default::default()
    }
}
