//! Error types for the ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad error classification, matching how callers react to a
/// failure rather than where it originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input, rejected synchronously and never partially applied
    Validation,
    /// Unknown user/jar/transaction reference, no mutation performed
    NotFound,
    /// Double-confirm, cross-user reference, already-settled id
    Conflict,
    /// Storage, serialization, or actor plumbing failure
    Internal,
}

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Amount must be a positive decimal
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Category must be non-empty
    #[error("Invalid category: {0}")]
    InvalidCategory(String),

    /// Wallet address failed shape validation
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    /// Jar budget must be a positive decimal
    #[error("Invalid jar budget: {0}")]
    InvalidBudget(String),

    /// Confirmation set is malformed (empty, duplicate ids, blank
    /// hash), rejected before any row is read
    #[error("Invalid confirmation set: {0}")]
    InvalidConfirmation(String),

    /// Guardian contact must be non-empty
    #[error("Invalid guardian contact: {0}")]
    InvalidContact(String),

    /// User not found
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Jar not found (or not owned by the caller)
    #[error("Jar not found: {0}")]
    JarNotFound(String),

    /// Transaction not found
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Confirmation referenced an id that is not confirmable: unknown,
    /// owned by another user, or already settled
    #[error("Confirmation mismatch: {0}")]
    ConfirmationMismatch(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error per the ledger's error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidAmount(_)
            | Error::InvalidCategory(_)
            | Error::InvalidAddress(_)
            | Error::InvalidBudget(_)
            | Error::InvalidConfirmation(_)
            | Error::InvalidContact(_) => ErrorKind::Validation,
            Error::UserNotFound(_)
            | Error::JarNotFound(_)
            | Error::TransactionNotFound(_) => ErrorKind::NotFound,
            Error::ConfirmationMismatch(_) => ErrorKind::Conflict,
            Error::Storage(_)
            | Error::Serialization(_)
            | Error::Concurrency(_)
            | Error::Config(_)
            | Error::Io(_) => ErrorKind::Internal,
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
