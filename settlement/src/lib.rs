//! Jarcash Settlement Engine
//!
//! Orchestrates the pending-to-settled lifecycle: snapshots a user's
//! pending transactions, commits their Merkle root to an external
//! append-only ledger, applies the confirmation back to the durable
//! store, and fans the resulting state out to the user's connected
//! devices. The engine owns the side effects; `ledger-core` stays
//! transport-free underneath it.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod chain;
pub mod commitment;
pub mod config;
pub mod engine;
pub mod error;
pub mod notifier;

pub use chain::LedgerNetwork;
pub use commitment::{Commitment, PreparedSettlement, COMMITMENT_KIND};
pub use config::SettlementConfig;
pub use engine::{SettlementEngine, SettlementOutcome};
pub use error::{Result, SettlementError};
pub use notifier::Notifier;
