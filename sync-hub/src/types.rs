//! Event classification

use serde::{Deserialize, Serialize};

/// What a sync event describes; the subject string is what clients
/// switch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Full jar set replaced or jar aggregates moved
    JarsSync,
    /// Transactions appended or settled
    TransactionSync,
    /// External ledger balance refreshed
    BalanceSync,
}

impl EventKind {
    /// Wire subject for this kind
    pub fn subject(&self) -> &'static str {
        match self {
            EventKind::JarsSync => "sync:jars",
            EventKind::TransactionSync => "sync:transactions",
            EventKind::BalanceSync => "sync:balance",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.subject())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subjects() {
        assert_eq!(EventKind::JarsSync.subject(), "sync:jars");
        assert_eq!(EventKind::TransactionSync.subject(), "sync:transactions");
        assert_eq!(EventKind::BalanceSync.subject(), "sync:balance");
    }
}
