//! Ledger facade
//!
//! Public entry point for the crate. Owns the storage handle and the
//! single-writer actor, and validates every input before it reaches
//! the actor task. Transport concerns (sockets, fan-out, signing) live
//! in the crates above; this type only knows money, jars, and streaks.

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    error::{Error, Result},
    types::{
        EmergencyRequest, EmergencyStatus, Jar, JarSpec, RecordOutcome, Settlement, Transaction,
        TransactionFilter, User, WalletAddress,
    },
    Config, Metrics, Storage,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Minimum length of an accepted wallet address
const MIN_ADDRESS_LEN: usize = 8;

/// The jar-budgeting ledger
pub struct Ledger {
    storage: Arc<Storage>,
    handle: LedgerHandle,
    metrics: Metrics,
}

impl Ledger {
    /// Open the ledger at the configured data directory and spawn the
    /// writer actor
    pub fn open(config: &Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(config)?);
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Metrics registration failed: {}", e)))?;
        let handle = spawn_ledger_actor(storage.clone(), metrics.clone(), config.mailbox_capacity);

        info!(data_dir = %config.data_dir.display(), "Ledger opened");

        Ok(Self {
            storage,
            handle,
            metrics,
        })
    }

    /// Authenticate a wallet address, creating the user with the
    /// default jar set on first connect
    pub async fn connect_wallet(
        &self,
        address: &str,
        display_name: Option<String>,
    ) -> Result<User> {
        let trimmed = address.trim();
        if trimmed.len() < MIN_ADDRESS_LEN {
            return Err(Error::InvalidAddress(format!(
                "Address must be at least {} characters",
                MIN_ADDRESS_LEN
            )));
        }

        self.handle
            .connect_wallet(WalletAddress::new(trimmed), display_name)
            .await
    }

    /// Record a spending event against an optional jar, advancing the
    /// user's streak for today's UTC calendar day
    pub async fn record(
        &self,
        user_id: Uuid,
        jar_id: Option<Uuid>,
        amount: Decimal,
        description: String,
        category: String,
    ) -> Result<RecordOutcome> {
        self.record_on(user_id, jar_id, amount, description, category, Utc::now().date_naive())
            .await
    }

    /// Record with an explicit calendar day; the day only feeds streak
    /// arithmetic, timestamps still come from the wall clock
    pub async fn record_on(
        &self,
        user_id: Uuid,
        jar_id: Option<Uuid>,
        amount: Decimal,
        description: String,
        category: String,
        today: NaiveDate,
    ) -> Result<RecordOutcome> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }
        let category = category.trim().to_string();
        if category.is_empty() {
            return Err(Error::InvalidCategory(
                "Category must not be empty".to_string(),
            ));
        }

        self.handle
            .record(user_id, jar_id, amount, description, category, today)
            .await
    }

    /// List a user's transactions, newest first
    pub async fn list_transactions(
        &self,
        user_id: Uuid,
        filter: TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        self.handle.list(user_id, filter).await
    }

    /// Fetch a user row
    pub async fn get_user(&self, user_id: Uuid) -> Result<User> {
        self.handle.get_user(user_id).await
    }

    /// Fetch a user's jars
    pub async fn get_jars(&self, user_id: Uuid) -> Result<Vec<Jar>> {
        self.handle.get_jars(user_id).await
    }

    /// Replace a user's jar set wholesale
    pub async fn replace_jars(&self, user_id: Uuid, specs: Vec<JarSpec>) -> Result<Vec<Jar>> {
        for spec in &specs {
            if spec.name.trim().is_empty() {
                return Err(Error::InvalidBudget(
                    "Jar name must not be empty".to_string(),
                ));
            }
            if spec.budget_amount <= Decimal::ZERO {
                return Err(Error::InvalidBudget(format!(
                    "Jar '{}' must have a positive budget",
                    spec.name
                )));
            }
        }

        self.handle.replace_jars(user_id, specs).await
    }

    /// Snapshot every pending transaction for settlement preparation
    pub async fn pending_snapshot(&self, user_id: Uuid) -> Result<Vec<Transaction>> {
        self.handle.pending_snapshot(user_id).await
    }

    /// Apply an external-ledger confirmation: marks the batch settled
    /// and appends the settlement record in one atomic unit
    pub async fn confirm_batch(
        &self,
        user_id: Uuid,
        ledger_txn_hash: String,
        transaction_ids: Vec<Uuid>,
        merkle_root: String,
    ) -> Result<Vec<Transaction>> {
        if transaction_ids.is_empty() {
            return Err(Error::InvalidConfirmation(
                "Confirmation set is empty".to_string(),
            ));
        }
        if ledger_txn_hash.trim().is_empty() {
            return Err(Error::InvalidConfirmation(
                "Missing external ledger hash".to_string(),
            ));
        }

        self.handle
            .confirm_batch(user_id, ledger_txn_hash, transaction_ids, merkle_root)
            .await
    }

    /// Persist a new emergency funding request in `Pending` state
    pub async fn create_emergency(
        &self,
        user_id: Uuid,
        guardian_contact: String,
        amount: Decimal,
        reason: String,
    ) -> Result<EmergencyRequest> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }
        if guardian_contact.trim().is_empty() {
            return Err(Error::InvalidContact(
                "Guardian contact must not be empty".to_string(),
            ));
        }
        // The user must exist before we file a request against them
        self.handle.get_user(user_id).await?;

        let request = EmergencyRequest {
            request_id: Uuid::now_v7(),
            user_id,
            guardian_contact,
            amount,
            reason,
            status: EmergencyStatus::Pending,
            created_at: Utc::now(),
        };
        self.handle.create_emergency(request).await
    }

    /// Mark an emergency request as sent to the guardian
    pub async fn mark_emergency_sent(&self, request_id: Uuid) -> Result<EmergencyRequest> {
        self.handle.mark_emergency_sent(request_id).await
    }

    /// Look up a user by wallet address without creating one
    pub fn user_by_address(&self, address: &str) -> Result<Option<User>> {
        self.storage
            .find_user_by_address(&WalletAddress::new(address.trim()))
    }

    /// Fetch a settlement record
    pub fn get_settlement(&self, settlement_id: Uuid) -> Result<Settlement> {
        self.storage.get_settlement(settlement_id)
    }

    /// List a user's settlement records
    pub fn user_settlements(&self, user_id: Uuid) -> Result<Vec<Settlement>> {
        self.storage.user_settlements(user_id)
    }

    /// Metrics handle for scraping
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Stop the writer actor; in-flight commands are drained first
    pub async fn shutdown(&self) -> Result<()> {
        info!("Ledger shutting down");
        self.handle.shutdown().await
    }
}
