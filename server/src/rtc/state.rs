//! Connection State Machine
//!
//! Maps transport connectivity changes onto the viewer's session: reaching
//! `connected` marks the session, every terminal state destroys it.

use std::sync::{Arc, Weak};

use anyhow::anyhow;
use tracing::{debug, info, warn};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

use super::session::{Session, SessionRegistry};

/// Connectivity transitions that drive session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionEvent {
    /// Transport states outside the table (`new`, `connecting`) map to `None`.
    #[must_use]
    pub const fn from_state(state: RTCPeerConnectionState) -> Option<Self> {
        match state {
            RTCPeerConnectionState::Connected => Some(Self::Connected),
            RTCPeerConnectionState::Disconnected => Some(Self::Disconnected),
            RTCPeerConnectionState::Failed => Some(Self::Failed),
            RTCPeerConnectionState::Closed => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Observes one peer connection on behalf of its session.
///
/// Holds only weak references: the session owns the peer, which owns this
/// observer through its callbacks.
pub struct ConnectionObserver {
    viewer_id: String,
    session: Weak<dyn Session>,
    registry: Weak<dyn SessionRegistry>,
}

impl ConnectionObserver {
    #[must_use]
    pub fn new(
        viewer_id: &str,
        session: &Arc<dyn Session>,
        registry: &Arc<dyn SessionRegistry>,
    ) -> Self {
        Self {
            viewer_id: viewer_id.to_string(),
            session: Arc::downgrade(session),
            registry: Arc::downgrade(registry),
        }
    }

    pub fn on_state_change(&self, state: RTCPeerConnectionState) {
        debug!(viewer_id = %self.viewer_id, state = %state, "Peer connection state changed");

        if let Some(event) = ConnectionEvent::from_state(state) {
            self.handle(event);
        }
    }

    /// ICE agent transitions are logged only; teardown follows the
    /// aggregate connection state.
    pub fn on_ice_state_change(&self, state: RTCIceConnectionState) {
        info!(viewer_id = %self.viewer_id, connection_state = %state, "ICE connection state changed");
    }

    pub fn handle(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected => {
                info!(viewer_id = %self.viewer_id, "Peer connected");
                let marked = match self.session.upgrade() {
                    Some(session) => session.set_connected(true),
                    None => Err(anyhow!("session dropped")),
                };
                if let Err(e) = marked {
                    warn!(viewer_id = %self.viewer_id, error = %e, "Unable to set connected on peer");
                    self.destroy();
                }
            }
            ConnectionEvent::Disconnected => {
                info!(viewer_id = %self.viewer_id, "Peer disconnected");
                self.destroy();
            }
            ConnectionEvent::Failed => {
                warn!(viewer_id = %self.viewer_id, "Peer failed");
                self.destroy();
            }
            ConnectionEvent::Closed => {
                info!(viewer_id = %self.viewer_id, "Peer closed");
                self.destroy();
            }
        }
    }

    fn destroy(&self) {
        match self.registry.upgrade() {
            Some(registry) => registry.destroy(&self.viewer_id),
            None => debug!(viewer_id = %self.viewer_id, "Registry gone, nothing to destroy"),
        }
    }
}
