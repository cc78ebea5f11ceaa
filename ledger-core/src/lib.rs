//! Jarcash Ledger Core
//!
//! Durable ledger of spending events ("transactions") tracked against
//! per-user budget jars, with Merkle batching primitives for external
//! settlement.
//!
//! # Architecture
//!
//! - **Single writer**: all mutations flow through one actor task, so
//!   jar aggregates and streaks are read-modify-written without locks
//! - **Atomic units**: every multi-row write (transaction + jar +
//!   streak, batch confirm + settlement record) is one RocksDB
//!   `WriteBatch`; partial visibility is never observable
//! - **Transport-free**: operations return deltas; pushing them to
//!   live sessions is the caller's concern

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod actor;
pub mod config;
pub mod error;
pub mod ledger;
pub mod merkle;
pub mod metrics;
pub mod storage;
pub mod streak;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use ledger::Ledger;
pub use metrics::Metrics;
pub use storage::Storage;
pub use types::{
    EmergencyRequest, EmergencyStatus, Jar, JarSpec, RecordOutcome, Settlement, Transaction,
    TransactionFilter, TransactionStatus, User, WalletAddress,
};
