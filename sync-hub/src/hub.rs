//! Per-user session registry and fan-out

use crate::{message::SyncEvent, types::EventKind, Result};
use dashmap::DashMap;
use prometheus::{IntCounter, IntGauge, Opts, Registry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default per-session channel capacity
pub const DEFAULT_SESSION_CAPACITY: usize = 256;

/// Resolves a presented credential to the user it belongs to.
///
/// The hub never inspects credentials itself; the embedding service
/// decides what a credential is (a wallet signature, an API token).
pub trait CredentialVerifier: Send + Sync {
    /// Verify the credential and return the owning user id
    fn verify(&self, credential: &str) -> Result<Uuid>;
}

/// What an authenticated session gets back: its identity and the
/// receiving end of its event channel
#[derive(Debug)]
pub struct SessionGrant {
    /// Unique id for this session
    pub session_id: Uuid,
    /// User the session belongs to
    pub user_id: Uuid,
    /// Event stream for this session
    pub receiver: mpsc::Receiver<SyncEvent>,
}

/// In-process fan-out hub
///
/// Sessions are grouped by user id. Publishing an event clones it into
/// every live session channel of that user; sessions whose receiver is
/// gone are pruned on the spot, and sessions whose channel is full
/// lose the event rather than block the publisher.
pub struct Hub {
    sessions: DashMap<Uuid, HashMap<Uuid, mpsc::Sender<SyncEvent>>>,
    capacity: usize,
    connected_sessions: IntGauge,
    events_delivered: IntCounter,
    events_dropped: IntCounter,
    registry: Arc<Registry>,
}

impl Hub {
    /// Create a hub with the default session channel capacity
    pub fn new() -> prometheus::Result<Self> {
        Self::with_capacity(DEFAULT_SESSION_CAPACITY)
    }

    /// Create a hub with an explicit session channel capacity
    pub fn with_capacity(capacity: usize) -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let connected_sessions = IntGauge::with_opts(Opts::new(
            "sync_hub_connected_sessions",
            "Currently connected sessions",
        ))?;
        registry.register(Box::new(connected_sessions.clone()))?;

        let events_delivered = IntCounter::with_opts(Opts::new(
            "sync_hub_events_delivered_total",
            "Events delivered to session channels",
        ))?;
        registry.register(Box::new(events_delivered.clone()))?;

        let events_dropped = IntCounter::with_opts(Opts::new(
            "sync_hub_events_dropped_total",
            "Events dropped because a session channel was full",
        ))?;
        registry.register(Box::new(events_dropped.clone()))?;

        Ok(Self {
            sessions: DashMap::new(),
            capacity,
            connected_sessions,
            events_delivered,
            events_dropped,
            registry,
        })
    }

    /// Authenticate a credential and register a new session for the
    /// resolved user
    pub fn authenticate(
        &self,
        verifier: &dyn CredentialVerifier,
        credential: &str,
    ) -> Result<SessionGrant> {
        let user_id = verifier.verify(credential)?;
        let session_id = Uuid::now_v7();
        let (tx, rx) = mpsc::channel(self.capacity);

        self.sessions
            .entry(user_id)
            .or_default()
            .insert(session_id, tx);
        self.connected_sessions.inc();

        debug!(%user_id, %session_id, "Session authenticated");

        Ok(SessionGrant {
            session_id,
            user_id,
            receiver: rx,
        })
    }

    /// Remove a session; a session id we no longer know is a no-op
    pub fn disconnect(&self, user_id: Uuid, session_id: Uuid) {
        let mut drop_user = false;
        if let Some(mut group) = self.sessions.get_mut(&user_id) {
            if group.remove(&session_id).is_some() {
                self.connected_sessions.dec();
                debug!(%user_id, %session_id, "Session disconnected");
            }
            drop_user = group.is_empty();
        }
        if drop_user {
            self.sessions.remove_if(&user_id, |_, group| group.is_empty());
        }
    }

    /// Publish an event to every live session of a user; returns the
    /// number of sessions that received it
    pub fn publish(
        &self,
        user_id: Uuid,
        kind: EventKind,
        payload: serde_json::Value,
    ) -> usize {
        let event = SyncEvent::new(kind, payload);
        let mut delivered = 0usize;
        let mut dead = Vec::new();

        if let Some(group) = self.sessions.get(&user_id) {
            for (session_id, tx) in group.iter() {
                match tx.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        self.events_dropped.inc();
                        warn!(%user_id, %session_id, subject = %kind, "Session channel full, event dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        dead.push(*session_id);
                    }
                }
            }
        }

        for session_id in dead {
            self.disconnect(user_id, session_id);
        }

        self.events_delivered.inc_by(delivered as u64);
        delivered
    }

    /// Number of live sessions for a user
    pub fn session_count(&self, user_id: Uuid) -> usize {
        self.sessions.get(&user_id).map_or(0, |group| group.len())
    }

    /// Total live sessions across all users
    pub fn total_sessions(&self) -> usize {
        self.sessions.iter().map(|group| group.len()).sum()
    }

    /// Metrics registry for scraping
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new().expect("Failed to create hub")
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("users", &self.sessions.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
