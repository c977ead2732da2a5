//! Signaling Bridge
//!
//! Inbound control-channel bytes go to the message handler keyed by viewer;
//! locally gathered ICE candidates go out through the viewer's session.

use std::sync::{Arc, Weak};

use tracing::{debug, info, warn};
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};

use super::error::RtcError;
use super::session::{MessageHandler, Session};

/// Serialize a candidate descriptor for the signaling transport.
pub fn candidate_json(candidate: &RTCIceCandidateInit) -> Result<String, RtcError> {
    serde_json::to_string(candidate).map_err(|e| RtcError::Signaling(e.to_string()))
}

/// Parse a candidate descriptor received from the viewer.
pub fn parse_candidate(json: &str) -> Result<RTCIceCandidateInit, RtcError> {
    serde_json::from_str(json)
        .map_err(|e| RtcError::Signaling(format!("Invalid ICE candidate: {e}")))
}

/// Relays local ICE candidates of one peer to its session.
pub struct CandidateSignaler {
    viewer_id: String,
    session: Weak<dyn Session>,
}

impl CandidateSignaler {
    #[must_use]
    pub fn new(viewer_id: &str, session: &Arc<dyn Session>) -> Self {
        Self {
            viewer_id: viewer_id.to_string(),
            session: Arc::downgrade(session),
        }
    }

    /// Handle one gathering callback. `None` marks the end of gathering,
    /// which is not forwarded.
    pub fn on_candidate(&self, candidate: Option<RTCIceCandidate>) {
        let Some(candidate) = candidate else {
            info!(viewer_id = %self.viewer_id, "Sent all ICE candidates");
            return;
        };

        match candidate.to_json() {
            Ok(init) => self.deliver(&init),
            Err(e) => {
                warn!(viewer_id = %self.viewer_id, error = %e, "Failed to convert ICE candidate");
            }
        }
    }

    /// Serialize and send one candidate. Failures drop this candidate only.
    pub fn deliver(&self, candidate: &RTCIceCandidateInit) {
        let payload = match candidate_json(candidate) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(viewer_id = %self.viewer_id, error = %e, "Failed to serialize ICE candidate");
                return;
            }
        };

        let Some(session) = self.session.upgrade() else {
            debug!(viewer_id = %self.viewer_id, "Session gone, dropping ICE candidate");
            return;
        };

        if let Err(e) = session.signal_candidate(payload) {
            warn!(viewer_id = %self.viewer_id, error = %e, "Failed to signal ICE candidate");
        }
    }
}

/// Routes control-channel messages of one viewer to the handler.
pub struct MessageDispatcher {
    viewer_id: String,
    handler: Arc<dyn MessageHandler>,
}

impl MessageDispatcher {
    #[must_use]
    pub fn new(viewer_id: &str, handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            viewer_id: viewer_id.to_string(),
            handler,
        }
    }

    pub fn dispatch(&self, message: DataChannelMessage) {
        if let Err(e) = self.handler.handle(&self.viewer_id, message.data) {
            warn!(viewer_id = %self.viewer_id, error = %e, "Data handle failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use webrtc::ice_transport::ice_candidate_type::RTCIceCandidateType;
    use webrtc::ice_transport::ice_protocol::RTCIceProtocol;

    use super::*;
    use crate::rtc::test_support::{EventCounter, MockSession, RecordingHandler};

    fn host_candidate_init(address: &str) -> RTCIceCandidateInit {
        RTCIceCandidateInit {
            candidate: format!("candidate:1 1 udp 2130706431 {address} 50000 typ host"),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
            username_fragment: None,
        }
    }

    #[test]
    fn host_candidate_reaches_session() {
        let mock = Arc::new(MockSession::default());
        let session: Arc<dyn Session> = mock.clone();
        let signaler = CandidateSignaler::new("viewer-1", &session);

        signaler.deliver(&host_candidate_init("10.0.0.5"));

        let sent = mock.candidates();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("10.0.0.5 50000 typ host"));
    }

    #[test]
    fn gathered_host_candidate_is_serialized() {
        let mock = Arc::new(MockSession::default());
        let session: Arc<dyn Session> = mock.clone();
        let signaler = CandidateSignaler::new("viewer-1", &session);

        signaler.on_candidate(Some(RTCIceCandidate {
            foundation: "1".into(),
            priority: 2130706431,
            address: "10.0.0.5".into(),
            protocol: RTCIceProtocol::Udp,
            port: 50000,
            typ: RTCIceCandidateType::Host,
            component: 1,
            ..Default::default()
        }));

        let sent = mock.candidates();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("10.0.0.5"));
        assert!(sent[0].contains("typ host"));
    }

    #[test]
    fn end_of_gathering_is_not_signaled() {
        let mock = Arc::new(MockSession::default());
        let session: Arc<dyn Session> = mock.clone();
        let signaler = CandidateSignaler::new("viewer-1", &session);

        signaler.on_candidate(None);

        assert!(mock.candidates().is_empty());
    }

    #[test]
    fn delivery_failure_is_logged_and_trickling_continues() {
        let warnings = EventCounter::warnings();
        let _guard = warnings.install();
        let mock = Arc::new(MockSession::failing_candidates());
        let session: Arc<dyn Session> = mock.clone();
        let signaler = CandidateSignaler::new("viewer-1", &session);

        signaler.deliver(&host_candidate_init("10.0.0.5"));
        signaler.deliver(&host_candidate_init("10.0.0.6"));

        assert_eq!(mock.candidate_attempts(), 2);
        assert_eq!(warnings.count(), 2);
    }

    #[test]
    fn dropped_session_swallows_candidates() {
        let session: Arc<dyn Session> = Arc::new(MockSession::default());
        let signaler = CandidateSignaler::new("viewer-1", &session);
        drop(session);

        signaler.deliver(&host_candidate_init("10.0.0.5"));
    }

    #[test]
    fn candidate_json_round_trips() {
        let init = host_candidate_init("192.0.2.1");
        let parsed = parse_candidate(&candidate_json(&init).unwrap()).unwrap();
        assert_eq!(parsed.candidate, init.candidate);
        assert_eq!(parsed.sdp_mline_index, Some(0));
        assert!(parse_candidate("{").is_err());
    }

    #[test]
    fn messages_are_keyed_by_viewer() {
        let handler = Arc::new(RecordingHandler::default());
        let dispatcher = MessageDispatcher::new("viewer-7", handler.clone());

        dispatcher.dispatch(DataChannelMessage {
            is_string: false,
            data: Bytes::from_static(&[1, 2, 3]),
        });

        let received = handler.received();
        assert_eq!(received, vec![("viewer-7".to_string(), Bytes::from_static(&[1, 2, 3]))]);
    }

    #[test]
    fn handler_errors_do_not_propagate() {
        let warnings = EventCounter::warnings();
        let _guard = warnings.install();
        let handler = Arc::new(RecordingHandler::failing());
        let dispatcher = MessageDispatcher::new("viewer-7", handler);

        dispatcher.dispatch(DataChannelMessage {
            is_string: true,
            data: Bytes::from_static(b"{}"),
        });

        assert_eq!(warnings.count(), 1);
    }
}
