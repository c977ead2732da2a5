//! Collaborator Interfaces
//!
//! Traits for everything the orchestrator talks to but does not own: the
//! session registry, the per-viewer session, the frame producer and the
//! handler for inbound control-channel bytes.

use bytes::Bytes;

use super::peer::Peer;
use super::track::Sample;

/// Registry owning viewer identity and destruction.
pub trait SessionRegistry: Send + Sync {
    /// Tear down the session for `viewer_id`.
    ///
    /// May be called more than once for the same viewer; implementations own
    /// idempotence.
    fn destroy(&self, viewer_id: &str);
}

/// One viewer's session handle.
pub trait Session: Send + Sync {
    /// Attach the viewer's peer. Exactly one peer is attached at a time.
    fn set_peer(&self, peer: Peer) -> anyhow::Result<()>;

    /// Mark the viewer as connected.
    fn set_connected(&self, connected: bool) -> anyhow::Result<()>;

    /// Relay one JSON-encoded local ICE candidate to the viewer.
    fn signal_candidate(&self, candidate: String) -> anyhow::Result<()>;
}

/// Callback receiving one encoded sample per call.
///
/// Runs on the producer's delivery path and must return without blocking.
pub type FrameConsumer = Box<dyn Fn(Sample) + Send + Sync>;

/// Source of the encoded audio and video streams.
pub trait FrameProducer: Send + Sync {
    /// Codec name of the audio stream (e.g. "Opus").
    fn audio_codec_name(&self) -> String;

    /// Codec name of the video stream (e.g. "VP8").
    fn video_codec_name(&self) -> String;

    /// Register the single audio frame consumer.
    fn on_audio_frame(&self, consumer: FrameConsumer);

    /// Register the single video frame consumer.
    fn on_video_frame(&self, consumer: FrameConsumer);
}

/// Handler for raw bytes received on a viewer's control channel.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, viewer_id: &str, data: Bytes) -> anyhow::Result<()>;
}
