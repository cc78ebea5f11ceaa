//! Settlement error types

use thiserror::Error;

/// Errors surfaced by the settlement engine
#[derive(Error, Debug)]
pub enum SettlementError {
    /// The underlying ledger rejected the operation
    #[error(transparent)]
    Ledger(#[from] ledger_core::Error),

    /// A settlement was requested with no pending transactions
    #[error("Nothing to settle")]
    NothingToSettle,

    /// The external ledger network failed
    #[error("Network error: {0}")]
    Network(String),

    /// The guardian notification channel failed
    #[error("Notifier error: {0}")]
    Notifier(String),

    /// Bad engine configuration
    #[error("Config error: {0}")]
    Config(String),
}

/// Result alias for settlement operations
pub type Result<T> = std::result::Result<T, SettlementError>;
