//! Test doubles for the orchestrator's collaborators.
//!
//! Only what the in-crate unit tests need; the integration tests carry their
//! own doubles under `tests/helpers`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::bail;
use bytes::Bytes;
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use super::peer::Peer;
use super::session::{MessageHandler, Session, SessionRegistry};

/// Layer counting events of one level emitted while installed.
#[derive(Clone)]
pub struct EventCounter {
    level: Level,
    count: Arc<AtomicUsize>,
}

impl EventCounter {
    pub fn at(level: Level) -> Self {
        Self {
            level,
            count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn warnings() -> Self {
        Self::at(Level::WARN)
    }

    /// Install as the thread-local default subscriber.
    pub fn install(&self) -> DefaultGuard {
        tracing_subscriber::registry().with(self.clone()).set_default()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for EventCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == self.level {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Session recording every call.
#[derive(Default)]
pub struct MockSession {
    fail_connected: bool,
    fail_candidates: bool,
    connected: Mutex<Vec<bool>>,
    candidates: Mutex<Vec<String>>,
    candidate_attempts: AtomicUsize,
}

impl MockSession {
    pub fn failing_connected() -> Self {
        Self {
            fail_connected: true,
            ..Self::default()
        }
    }

    pub fn failing_candidates() -> Self {
        Self {
            fail_candidates: true,
            ..Self::default()
        }
    }

    pub fn connected_calls(&self) -> Vec<bool> {
        self.connected.lock().unwrap().clone()
    }

    pub fn candidates(&self) -> Vec<String> {
        self.candidates.lock().unwrap().clone()
    }

    pub fn candidate_attempts(&self) -> usize {
        self.candidate_attempts.load(Ordering::SeqCst)
    }
}

impl Session for MockSession {
    fn set_peer(&self, _peer: Peer) -> anyhow::Result<()> {
        Ok(())
    }

    fn set_connected(&self, connected: bool) -> anyhow::Result<()> {
        self.connected.lock().unwrap().push(connected);
        if self.fail_connected {
            bail!("session is gone");
        }
        Ok(())
    }

    fn signal_candidate(&self, candidate: String) -> anyhow::Result<()> {
        self.candidate_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_candidates {
            bail!("signaling transport closed");
        }
        self.candidates.lock().unwrap().push(candidate);
        Ok(())
    }
}

/// Registry recording destroyed viewer ids in call order.
#[derive(Default)]
pub struct RecordingRegistry {
    destroyed: Mutex<Vec<String>>,
}

impl RecordingRegistry {
    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().unwrap().clone()
    }
}

impl SessionRegistry for RecordingRegistry {
    fn destroy(&self, viewer_id: &str) {
        self.destroyed.lock().unwrap().push(viewer_id.to_string());
    }
}

/// Message handler recording every delivery.
#[derive(Default)]
pub struct RecordingHandler {
    fail: bool,
    received: Mutex<Vec<(String, Bytes)>>,
}

impl RecordingHandler {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn received(&self) -> Vec<(String, Bytes)> {
        self.received.lock().unwrap().clone()
    }
}

impl MessageHandler for RecordingHandler {
    fn handle(&self, viewer_id: &str, data: Bytes) -> anyhow::Result<()> {
        if self.fail {
            bail!("unparseable command");
        }
        self.received
            .lock()
            .unwrap()
            .push((viewer_id.to_string(), data));
        Ok(())
    }
}
