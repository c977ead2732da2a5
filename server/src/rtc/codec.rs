//! Codec Table
//!
//! Fixed wire parameters for every codec the producer may emit. The table is
//! consulted once at startup; per-viewer media engines only ever register the
//! two entries resolved there.

use std::fmt;

use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};
use webrtc::rtp_transceiver::RTCPFeedback;

use super::error::RtcError;

/// The kind of media a codec carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Audio codec.
    Audio,
    /// Video codec.
    Video,
}

impl MediaKind {
    /// RTP codec type used when registering with a media engine.
    #[must_use]
    pub const fn rtp_codec_type(self) -> RTPCodecType {
        match self {
            Self::Audio => RTPCodecType::Audio,
            Self::Video => RTPCodecType::Video,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One RTCP feedback mechanism advertised for a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feedback {
    pub typ: &'static str,
    pub parameter: &'static str,
}

/// Wire parameters of a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecParameters {
    /// Logical codec name as reported by the producer (e.g. "VP8").
    pub name: &'static str,
    /// Audio or video.
    pub kind: MediaKind,
    /// MIME type (e.g. "video/VP8").
    pub mime_type: &'static str,
    /// RTP clock rate in Hz.
    pub clock_rate: u32,
    /// Channel count (0 when not applicable).
    pub channels: u16,
    /// SDP `a=fmtp` line.
    pub sdp_fmtp_line: &'static str,
    /// RTCP feedback list.
    pub rtcp_feedback: &'static [Feedback],
    /// RTP payload type.
    pub payload_type: u8,
}

impl CodecParameters {
    /// Capability used for tracks carrying this codec.
    #[must_use]
    pub fn capability(&self) -> RTCRtpCodecCapability {
        RTCRtpCodecCapability {
            mime_type: self.mime_type.to_string(),
            clock_rate: self.clock_rate,
            channels: self.channels,
            sdp_fmtp_line: self.sdp_fmtp_line.to_string(),
            rtcp_feedback: self
                .rtcp_feedback
                .iter()
                .map(|fb| RTCPFeedback {
                    typ: fb.typ.to_string(),
                    parameter: fb.parameter.to_string(),
                })
                .collect(),
        }
    }

    /// Parameters registered with a per-viewer media engine.
    #[must_use]
    pub fn rtp_parameters(&self) -> RTCRtpCodecParameters {
        RTCRtpCodecParameters {
            capability: self.capability(),
            payload_type: self.payload_type,
            ..Default::default()
        }
    }
}

const H264_FMTP: &str = "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42001f";

const fn video(
    name: &'static str,
    mime_type: &'static str,
    sdp_fmtp_line: &'static str,
    payload_type: u8,
) -> CodecParameters {
    CodecParameters {
        name,
        kind: MediaKind::Video,
        mime_type,
        clock_rate: 90000,
        channels: 0,
        sdp_fmtp_line,
        rtcp_feedback: &[],
        payload_type,
    }
}

const fn audio(
    name: &'static str,
    mime_type: &'static str,
    clock_rate: u32,
    channels: u16,
    payload_type: u8,
) -> CodecParameters {
    CodecParameters {
        name,
        kind: MediaKind::Audio,
        mime_type,
        clock_rate,
        channels,
        sdp_fmtp_line: "",
        rtcp_feedback: &[],
        payload_type,
    }
}

static CODECS: [CodecParameters; 7] = [
    video("VP8", "video/VP8", "", 96),
    video("VP9", "video/VP9", "", 98),
    video("H264", "video/H264", H264_FMTP, 102),
    audio("Opus", "audio/opus", 48000, 2, 111),
    audio("G722", "audio/G722", 8000, 0, 9),
    audio("PCMU", "audio/PCMU", 8000, 0, 0),
    audio("PCMA", "audio/PCMA", 8000, 0, 8),
];

/// Resolve a codec name to its wire parameters.
///
/// Names match exactly; there is no fallback codec.
pub fn lookup(name: &str) -> Result<CodecParameters, RtcError> {
    CODECS
        .iter()
        .find(|codec| codec.name == name)
        .copied()
        .ok_or_else(|| RtcError::UnsupportedCodec(name.to_string()))
}
