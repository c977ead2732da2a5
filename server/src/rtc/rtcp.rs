//! RTCP Drain Loops
//!
//! Every outbound sender buffers incoming RTCP until someone reads it; an
//! unread queue eventually stalls the interceptors. Feedback is not
//! interpreted here, only consumed.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{trace, Instrument, Span};
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;

use super::codec::MediaKind;

/// Read buffer size (MTU).
const RTCP_BUFFER_SIZE: usize = 1500;

/// Anything RTCP can be read from.
pub trait RtcpSource: Send + Sync + 'static {
    fn read_rtcp(&self, buf: &mut [u8]) -> impl Future<Output = Result<(), webrtc::Error>> + Send;
}

impl RtcpSource for RTCRtpSender {
    async fn read_rtcp(&self, buf: &mut [u8]) -> Result<(), webrtc::Error> {
        self.read(buf).await.map(|_| ())
    }
}

/// Spawn a detached loop discarding RTCP from `source`.
///
/// The loop ends on the first read error, which is how sender teardown
/// surfaces.
pub fn spawn_rtcp_drain<S: RtcpSource>(source: Arc<S>, kind: MediaKind, span: Span) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            let mut buf = vec![0u8; RTCP_BUFFER_SIZE];
            while source.read_rtcp(&mut buf).await.is_ok() {}
            trace!(kind = %kind, "RTCP drain stopped");
        }
        .instrument(span),
    )
}
