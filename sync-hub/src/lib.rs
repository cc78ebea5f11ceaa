//! Jarcash Sync Hub
//!
//! In-process fan-out for keeping a user's connected devices in sync.
//! Sessions authenticate with a credential, land in a per-user group,
//! and receive every state event published for that user over a
//! bounded channel. Delivery is at-most-once to currently connected
//! sessions: there is no replay, no outbox, no cross-process routing.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod error;
pub mod hub;
pub mod message;
pub mod types;

pub use error::{HubError, Result};
pub use hub::{CredentialVerifier, Hub, SessionGrant};
pub use message::SyncEvent;
pub use types::EventKind;
