//! Shared Media Tracks
//!
//! One audio and one video track exist per process. Every peer connection
//! binds to the same two instances and the transport fans each written
//! sample out to all bound peers.
//!
//! The producer pushes frames through a per-kind [`FrameConsumer`] that only
//! enqueues; a pump task drains the queue into the track so the producer's
//! delivery path never waits on the network.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn, Instrument, Span};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

use super::codec::{self, CodecParameters, MediaKind};
use super::error::{RtcError, TrackError};
use super::session::FrameConsumer;

/// Stream id shared by both tracks so browsers group them together.
const STREAM_ID: &str = "stream";

/// Frames buffered per kind between the producer and the track.
const FRAME_QUEUE_DEPTH: usize = 64;

/// One encoded media unit.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    /// Encoded payload.
    pub data: Bytes,
    /// Presentation duration.
    pub duration: Duration,
}

/// Anything a sample can be written into.
pub trait SampleWriter: Send + Sync + 'static {
    fn write_sample(&self, sample: &Sample) -> impl Future<Output = Result<(), TrackError>> + Send;
}

/// Process-wide track for one media kind.
#[derive(Clone)]
pub struct SharedTrack {
    codec: CodecParameters,
    track: Arc<TrackLocalStaticSample>,
}

impl SharedTrack {
    /// Create a track carrying `codec`.
    #[must_use]
    pub fn new(codec: CodecParameters) -> Self {
        let track = Arc::new(TrackLocalStaticSample::new(
            codec.capability(),
            codec.kind.as_str().to_string(),
            STREAM_ID.to_string(),
        ));

        Self { codec, track }
    }

    /// Codec negotiated for this track.
    #[must_use]
    pub const fn codec(&self) -> &CodecParameters {
        &self.codec
    }

    #[must_use]
    pub const fn kind(&self) -> MediaKind {
        self.codec.kind
    }

    /// Handle to add to a peer connection.
    #[must_use]
    pub fn local(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        Arc::clone(&self.track) as Arc<dyn TrackLocal + Send + Sync>
    }

    /// Whether two handles refer to the same underlying track.
    #[must_use]
    pub fn same_track(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.track, &other.track)
    }
}

impl SampleWriter for SharedTrack {
    async fn write_sample(&self, sample: &Sample) -> Result<(), TrackError> {
        self.track
            .write_sample(&webrtc::media::Sample {
                data: sample.data.clone(),
                duration: sample.duration,
                ..Default::default()
            })
            .await
            .map_err(TrackError::from)
    }
}

/// Resolve `codec_name` and create a shared track for it.
pub fn create_track(codec_name: &str) -> Result<SharedTrack, RtcError> {
    let codec = codec::lookup(codec_name)?;
    Ok(SharedTrack::new(codec))
}

/// Write one sample, absorbing failures.
///
/// Writes into a torn-down track are expected during shutdown and dropped
/// silently. Anything else is logged once and the frame is dropped.
pub async fn forward_sample<W: SampleWriter>(writer: &W, kind: MediaKind, sample: &Sample) {
    match writer.write_sample(sample).await {
        Ok(()) | Err(TrackError::Closed) => {}
        Err(e) => {
            warn!(kind = %kind, error = %e, "Pipeline failed to write sample");
        }
    }
}

/// Spawn the pump for one media kind and return the consumer feeding it.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_frame_pump<W: SampleWriter>(kind: MediaKind, writer: W, span: Span) -> FrameConsumer {
    let (tx, mut rx) = mpsc::channel::<Sample>(FRAME_QUEUE_DEPTH);

    tokio::spawn(
        async move {
            while let Some(sample) = rx.recv().await {
                forward_sample(&writer, kind, &sample).await;
            }
            debug!(kind = %kind, "Frame pump stopped");
        }
        .instrument(span),
    );

    Box::new(move |sample: Sample| match tx.try_send(sample) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            debug!(kind = %kind, "Frame queue full, dropping sample");
        }
        Err(TrySendError::Closed(_)) => {
            debug!(kind = %kind, "Frame pump gone, dropping sample");
        }
    })
}
