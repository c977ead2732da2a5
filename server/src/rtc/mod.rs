//! WebRTC Orchestrator
//!
//! Streams one encoded audio and one encoded video source to many viewers,
//! each over its own peer connection.
//!
//! This module provides:
//! - Codec table and shared tracks fed by the frame producer
//! - Per-viewer peer construction and SDP offer
//! - ICE candidate trickling and control-channel dispatch
//! - Session teardown driven by connection state
//!
//! SDP and candidate payloads travel through the caller's signaling
//! transport; see [`session`] for the collaborator traits.

pub mod codec;
pub mod error;
mod manager;
mod peer;
pub mod rtcp;
pub mod session;
pub mod signaling;
pub mod state;
pub mod track;
pub mod transport;

#[cfg(test)]
mod test_support;

// Re-exports
pub use codec::{CodecParameters, MediaKind};
pub use error::{RtcError, TrackError};
pub use manager::{PeerOffer, WebRtcManager, DATA_CHANNEL_ID, DATA_CHANNEL_LABEL};
pub use peer::Peer;
pub use session::{FrameConsumer, FrameProducer, MessageHandler, Session, SessionRegistry};
pub use track::{Sample, SharedTrack};
