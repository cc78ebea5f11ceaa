//! Guardian notification boundary

use crate::Result;
use async_trait::async_trait;

/// Out-of-band channel for reaching a user's guardian contact,
/// typically SMS behind a provider client
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message to the contact
    async fn send(&self, contact: &str, message: &str) -> Result<()>;
}
