//! External ledger network boundary

use crate::Result;
use async_trait::async_trait;
use ledger_core::WalletAddress;
use rust_decimal::Decimal;

/// The append-only ledger the engine commits batch roots to.
///
/// Implementations wrap a real network client; the engine only needs
/// note submission and a balance read. Submission returns the
/// network's transaction hash, which later confirms the batch.
#[async_trait]
pub trait LedgerNetwork: Send + Sync {
    /// Submit a commitment note from the given wallet; returns the
    /// network transaction hash
    async fn submit(&self, from: &WalletAddress, note: &[u8]) -> Result<String>;

    /// Current spendable balance of a wallet
    async fn balance(&self, address: &WalletAddress) -> Result<Decimal>;
}
