//! Batch commitment payloads
//!
//! What actually lands on the external ledger is a small JSON note
//! carrying the Merkle root of the batch, never the transactions
//! themselves.

use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminator written into every commitment note
pub const COMMITMENT_KIND: &str = "JARCASH_SETTLEMENT";

/// The note committed to the external ledger for one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    /// Always [`COMMITMENT_KIND`]
    pub kind: String,
    /// Base64 Merkle root over the batch's transaction ids
    pub merkle_root: String,
    /// Number of transactions the root commits to
    pub count: usize,
    /// Wall-clock time the commitment was built, in Unix milliseconds
    pub timestamp_ms: i64,
}

impl Commitment {
    /// Build a commitment for a batch
    pub fn new(merkle_root: String, count: usize, at: DateTime<Utc>) -> Self {
        Self {
            kind: COMMITMENT_KIND.to_string(),
            merkle_root,
            count,
            timestamp_ms: at.timestamp_millis(),
        }
    }

    /// Serialize as the note bytes submitted to the network
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| crate::SettlementError::Network(format!("Cannot encode note: {}", e)))
    }
}

/// A snapshot ready for submission; holds everything the confirmation
/// step needs to apply the result later
#[derive(Debug, Clone)]
pub struct PreparedSettlement {
    /// User whose pending transactions are in the batch
    pub user_id: Uuid,
    /// The ids committed to, sorted ascending
    pub transaction_ids: Vec<Uuid>,
    /// Base64 root over [`Self::transaction_ids`]
    pub merkle_root: String,
    /// The note to submit
    pub commitment: Commitment,
}
