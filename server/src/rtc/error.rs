//! WebRTC Orchestrator Errors

use thiserror::Error;

use super::codec::MediaKind;

/// Errors that can occur while setting up tracks or building peers.
#[derive(Debug, Error)]
pub enum RtcError {
    /// Codec name is not in the codec table.
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// Codec exists but carries the wrong media kind for its slot.
    #[error("codec {codec} cannot carry {expected}")]
    CodecKindMismatch {
        /// Codec name as configured by the producer.
        codec: String,
        /// Media kind the slot requires.
        expected: MediaKind,
    },

    /// `create_peer` called before `start`.
    #[error("WebRTC manager has not been started")]
    NotStarted,

    /// `start` called more than once.
    #[error("WebRTC manager already started")]
    AlreadyStarted,

    /// WebRTC error.
    #[error("WebRTC error: {0}")]
    WebRtc(String),

    /// Signaling payload could not be built or parsed.
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// Session rejected an operation.
    #[error("Session error: {0}")]
    Session(String),
}

impl From<webrtc::Error> for RtcError {
    fn from(err: webrtc::Error) -> Self {
        Self::WebRtc(err.to_string())
    }
}

/// Errors from writing a sample into a shared track.
#[derive(Debug, Error)]
pub enum TrackError {
    /// The track or its transport is already torn down.
    #[error("track closed")]
    Closed,

    /// Any other write failure.
    #[error("track write failed: {0}")]
    Write(String),
}

impl From<webrtc::Error> for TrackError {
    fn from(err: webrtc::Error) -> Self {
        if is_closed(&err) {
            return Self::Closed;
        }

        // Static tracks fan out to every binding and join the per-binding
        // failures into one message, one line each.
        let message = err.to_string();
        let closed_lines = closed_messages();
        let all_closed = !message.is_empty()
            && message
                .lines()
                .all(|line| closed_lines.iter().any(|closed| closed == line));

        if all_closed {
            Self::Closed
        } else {
            Self::Write(message)
        }
    }
}

const fn is_closed(err: &webrtc::Error) -> bool {
    matches!(
        err,
        webrtc::Error::ErrClosedPipe | webrtc::Error::ErrConnectionClosed
    )
}

fn closed_messages() -> [String; 2] {
    [
        webrtc::Error::ErrClosedPipe.to_string(),
        webrtc::Error::ErrConnectionClosed.to_string(),
    ]
}
