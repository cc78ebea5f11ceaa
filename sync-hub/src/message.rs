//! Sync event envelope

use crate::{types::EventKind, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One state change pushed to every connected session of a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent {
    /// Unique event id (time-ordered)
    pub id: Uuid,
    /// Event classification
    pub kind: EventKind,
    /// Kind-specific payload
    pub payload: serde_json::Value,
    /// When the event was published
    pub timestamp: DateTime<Utc>,
}

impl SyncEvent {
    /// Build an event with a fresh id and the current timestamp
    pub fn new(kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Serialize for a wire transport
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from a wire transport
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
