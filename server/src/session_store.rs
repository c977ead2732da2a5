//! In-memory session registry.
//!
//! Keeps one [`ViewerSession`] per viewer id and forwards locally gathered
//! ICE candidates to an outbox drained by the signaling transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::anyhow;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::rtc::{Peer, Session, SessionRegistry};

/// Outbound signaling message for one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalEvent {
    /// Local ICE candidate, JSON-encoded.
    Candidate { viewer_id: String, candidate: String },
}

/// One viewer's session.
pub struct ViewerSession {
    viewer_id: String,
    connected: AtomicBool,
    peer: Mutex<Option<Peer>>,
    outbox: mpsc::UnboundedSender<SignalEvent>,
}

impl ViewerSession {
    fn new(viewer_id: &str, outbox: mpsc::UnboundedSender<SignalEvent>) -> Self {
        Self {
            viewer_id: viewer_id.to_string(),
            connected: AtomicBool::new(false),
            peer: Mutex::new(None),
            outbox,
        }
    }

    #[must_use]
    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Attached peer, if any.
    #[must_use]
    pub fn peer(&self) -> Option<Peer> {
        self.peer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Detach and close the peer in the background.
    ///
    /// The peer's callbacks are disarmed before this returns, so a closing
    /// connection never reports back into the registry.
    fn teardown(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let peer = self
            .peer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(peer) = peer {
            close_in_background(peer);
        }
    }
}

fn close_in_background(peer: Peer) {
    peer.disarm();
    tokio::spawn(async move {
        if peer.close().await.is_ok() {
            debug!(viewer_id = %peer.viewer_id(), "Peer closed");
        }
    });
}

impl Session for ViewerSession {
    fn set_peer(&self, peer: Peer) -> anyhow::Result<()> {
        let previous = self
            .peer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(peer);

        if let Some(previous) = previous {
            debug!(viewer_id = %self.viewer_id, "Replacing existing peer");
            close_in_background(previous);
        }
        Ok(())
    }

    fn set_connected(&self, connected: bool) -> anyhow::Result<()> {
        self.connected.store(connected, Ordering::SeqCst);
        Ok(())
    }

    fn signal_candidate(&self, candidate: String) -> anyhow::Result<()> {
        self.outbox
            .send(SignalEvent::Candidate {
                viewer_id: self.viewer_id.clone(),
                candidate,
            })
            .map_err(|_| anyhow!("signaling outbox closed"))
    }
}

/// Registry of live viewer sessions.
pub struct SessionManager {
    sessions: DashMap<String, Arc<ViewerSession>>,
    outbox: mpsc::UnboundedSender<SignalEvent>,
}

impl SessionManager {
    /// Create an empty registry and the receiving end of its outbox.
    #[must_use]
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<SignalEvent>) {
        let (outbox, rx) = mpsc::unbounded_channel();
        let manager = Arc::new(Self {
            sessions: DashMap::new(),
            outbox,
        });
        (manager, rx)
    }

    /// Register a new session for `viewer_id`, tearing down any previous one.
    pub fn create(&self, viewer_id: &str) -> Arc<ViewerSession> {
        let session = Arc::new(ViewerSession::new(viewer_id, self.outbox.clone()));

        if let Some(previous) = self
            .sessions
            .insert(viewer_id.to_string(), Arc::clone(&session))
        {
            info!(viewer_id = %viewer_id, "Replacing existing session");
            previous.teardown();
        }

        session
    }

    #[must_use]
    pub fn get(&self, viewer_id: &str) -> Option<Arc<ViewerSession>> {
        self.sessions.get(viewer_id).map(|entry| Arc::clone(&entry))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionRegistry for SessionManager {
    fn destroy(&self, viewer_id: &str) {
        match self.sessions.remove(viewer_id) {
            Some((_, session)) => {
                info!(viewer_id = %viewer_id, "Session destroyed");
                session.teardown();
            }
            None => debug!(viewer_id = %viewer_id, "Destroy for unknown session ignored"),
        }
    }
}
