//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for money)
//! - Day-granularity streak dates (NaiveDate, UTC calendar)

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Wallet-style address identifying a user on the external ledger
/// network. Unique per user; never changes after first login.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Create new wallet address
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for display names and log lines
    pub fn short(&self) -> &str {
        let end = self.0.len().min(8);
        self.0.get(..end).unwrap_or(&self.0)
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user, keyed by wallet address. Root aggregate: jars,
/// transactions, and emergency requests all belong to exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Surrogate identifier (UUIDv7)
    pub user_id: Uuid,

    /// Unique wallet address
    pub wallet_address: WalletAddress,

    /// Display name (defaults to a prefix of the address)
    pub display_name: String,

    /// Consecutive-activity counter
    pub streak_count: u32,

    /// Calendar day (UTC) of the last streak-counted activity
    pub last_streak_date: Option<NaiveDate>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last login timestamp
    pub last_login: DateTime<Utc>,
}

impl User {
    /// Create a fresh user for a first-time wallet connection.
    pub fn new(wallet_address: WalletAddress, display_name: Option<String>) -> Self {
        let now = Utc::now();
        let display_name =
            display_name.unwrap_or_else(|| format!("User {}", wallet_address.short()));
        Self {
            user_id: Uuid::now_v7(),
            wallet_address,
            display_name,
            streak_count: 0,
            last_streak_date: None,
            created_at: now,
            last_login: now,
        }
    }
}

/// A named budget bucket with a target amount and accrued spend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jar {
    /// Surrogate identifier
    pub jar_id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Jar name
    pub name: String,

    /// Budget target (positive)
    pub budget_amount: Decimal,

    /// Accrued spend; may exceed the budget
    pub spent_amount: Decimal,

    /// Display color tag
    pub color: String,

    /// Display icon tag
    pub icon: String,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Jar {
    /// Build a jar row from a replacement spec.
    pub fn from_spec(user_id: Uuid, spec: JarSpec) -> Self {
        Self {
            jar_id: Uuid::now_v7(),
            user_id,
            name: spec.name,
            budget_amount: spec.budget_amount,
            spent_amount: spec.spent_amount,
            color: spec.color,
            icon: spec.icon,
            created_at: Utc::now(),
        }
    }

    /// The four jars every new user starts with.
    pub fn defaults_for(user_id: Uuid) -> Vec<Jar> {
        const DEFAULTS: [(&str, i64, &str, &str); 4] = [
            ("Food & Dining", 5000, "#FF6B6B", "bowl"),
            ("Transport", 2000, "#4ECDC4", "bus"),
            ("Bills & Utilities", 3000, "#45B7D1", "bulb"),
            ("Fun & Entertainment", 2000, "#96CEB4", "game"),
        ];

        DEFAULTS
            .iter()
            .map(|(name, budget, color, icon)| Jar {
                jar_id: Uuid::now_v7(),
                user_id,
                name: (*name).to_string(),
                budget_amount: Decimal::from(*budget),
                spent_amount: Decimal::ZERO,
                color: (*color).to_string(),
                icon: (*icon).to_string(),
                created_at: Utc::now(),
            })
            .collect()
    }
}

/// Caller-supplied jar definition for a bulk replace. Carries
/// `spent_amount` so accrued spend survives a full resend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JarSpec {
    /// Jar name
    pub name: String,

    /// Budget target (positive)
    pub budget_amount: Decimal,

    /// Accrued spend to carry over
    #[serde(default)]
    pub spent_amount: Decimal,

    /// Display color tag
    pub color: String,

    /// Display icon tag
    pub icon: String,
}

/// Transaction status (state machine: Pending → Settled, terminal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionStatus {
    /// Recorded locally, not yet committed to the external ledger
    Pending = 1,
    /// Included in a confirmed settlement batch (terminal)
    Settled = 2,
}

/// A spending event. Immutable once created except for the
/// status/hash/settled_at fields written exactly once by settlement
/// confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Surrogate identifier (UUIDv7 for time-ordering)
    pub txn_id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Jar the spend counts against, if any
    pub jar_id: Option<Uuid>,

    /// Spend amount (positive)
    pub amount: Decimal,

    /// Free-form description
    pub description: String,

    /// Spending category (non-empty)
    pub category: String,

    /// Lifecycle status
    pub status: TransactionStatus,

    /// External ledger hash, present only once settled
    pub txn_hash: Option<String>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Settled timestamp, present only once settled
    pub settled_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Check if this transaction has reached its terminal state.
    pub fn is_settled(&self) -> bool {
        self.status == TransactionStatus::Settled
    }
}

/// Immutable record that a batch of transactions was committed to the
/// external ledger under one Merkle root. References transactions by
/// identifier only; an identifier appears in at most one settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    /// Surrogate identifier
    pub settlement_id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Base64 Merkle root over the sorted transaction identifiers
    pub merkle_root: String,

    /// Confirmation hash from the external ledger
    pub ledger_txn_hash: String,

    /// Sorted identifiers of the settled transactions
    pub transaction_ids: Vec<Uuid>,

    /// Settled timestamp
    pub settled_at: DateTime<Utc>,
}

/// Emergency request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EmergencyStatus {
    /// Created; the guardian has not (yet) been notified
    Pending = 1,
    /// Guardian notification succeeded
    Sent = 2,
}

/// A request for emergency funds from a guardian contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyRequest {
    /// Surrogate identifier
    pub request_id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Guardian contact (phone number or similar)
    pub guardian_contact: String,

    /// Requested amount (positive)
    pub amount: Decimal,

    /// Stated reason
    pub reason: String,

    /// Notification status
    pub status: EmergencyStatus,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

/// Filter for transaction listings. Paging is offset-based; callers
/// re-issue with a new offset rather than holding a cursor.
#[derive(Debug, Clone)]
pub struct TransactionFilter {
    /// Restrict to a single status
    pub status: Option<TransactionStatus>,

    /// Maximum rows returned
    pub limit: usize,

    /// Rows skipped (after status filtering)
    pub offset: usize,
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self {
            status: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// Delta produced by recording a spending event. The ledger returns
/// it to the caller; fanning it out to live sessions happens outside.
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    /// The newly created transaction
    pub transaction: Transaction,

    /// Updated jar snapshot, if the spend referenced a jar
    pub jar: Option<Jar>,

    /// Streak counter after this activity
    pub streak_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_address_short() {
        let addr = WalletAddress::new("JARCASH7WALLETADDRESS");
        assert_eq!(addr.short(), "JARCASH7");

        let tiny = WalletAddress::new("AB");
        assert_eq!(tiny.short(), "AB");
    }

    #[test]
    fn test_new_user_defaults() {
        let user = User::new(WalletAddress::new("JARCASH7WALLET"), None);
        assert_eq!(user.display_name, "User JARCASH7");
        assert_eq!(user.streak_count, 0);
        assert!(user.last_streak_date.is_none());
    }

    #[test]
    fn test_default_jars() {
        let user_id = Uuid::now_v7();
        let jars = Jar::defaults_for(user_id);

        assert_eq!(jars.len(), 4);
        assert!(jars.iter().all(|j| j.user_id == user_id));
        assert!(jars.iter().all(|j| j.spent_amount == Decimal::ZERO));
        assert!(jars.iter().all(|j| j.budget_amount > Decimal::ZERO));
        assert_eq!(jars[0].name, "Food & Dining");
    }

    #[test]
    fn test_transaction_terminal_state() {
        let mut txn = Transaction {
            txn_id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            jar_id: None,
            amount: Decimal::new(50000, 2),
            description: String::new(),
            category: "food".to_string(),
            status: TransactionStatus::Pending,
            txn_hash: None,
            created_at: Utc::now(),
            settled_at: None,
        };

        assert!(!txn.is_settled());
        txn.status = TransactionStatus::Settled;
        assert!(txn.is_settled());
    }
}
