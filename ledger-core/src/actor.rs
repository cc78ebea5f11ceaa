//! Actor-based concurrency for the ledger
//!
//! All mutations flow through a single actor task (single-writer
//! pattern): concurrent sessions of the same user may record spends,
//! replace jars, and confirm settlements at the same time, and the
//! actor serializes every read-modify-write on jar aggregates and
//! streak counters without locks. Durable atomicity within one
//! operation comes from the storage layer's `WriteBatch`, not from the
//! actor.
//!
//! Reads are served from the same task, so a snapshot reflects every
//! write committed before it.

use crate::{
    error::{Error, Result},
    merkle, streak,
    types::{
        EmergencyRequest, EmergencyStatus, Jar, JarSpec, RecordOutcome, Settlement, Transaction,
        TransactionFilter, TransactionStatus, User, WalletAddress,
    },
    Metrics, Storage,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Message sent to the ledger actor
pub enum LedgerCommand {
    /// Authenticate a wallet; creates the user (with default jars) on
    /// first sight, refreshes the login timestamp otherwise
    ConnectWallet {
        /// Wallet address presented by the caller
        address: WalletAddress,
        /// Optional display name for a first-time user
        display_name: Option<String>,
        /// Reply channel
        response: oneshot::Sender<Result<User>>,
    },

    /// Record a spending event
    Record {
        /// Owning user
        user_id: Uuid,
        /// Jar the spend counts against, if any
        jar_id: Option<Uuid>,
        /// Spend amount
        amount: Decimal,
        /// Free-form description
        description: String,
        /// Spending category
        category: String,
        /// Current UTC calendar day (injected for testability)
        today: NaiveDate,
        /// Reply channel
        response: oneshot::Sender<Result<RecordOutcome>>,
    },

    /// List transactions (newest first)
    List {
        /// Owning user
        user_id: Uuid,
        /// Status/paging filter
        filter: TransactionFilter,
        /// Reply channel
        response: oneshot::Sender<Result<Vec<Transaction>>>,
    },

    /// Get a user row
    GetUser {
        /// User to fetch
        user_id: Uuid,
        /// Reply channel
        response: oneshot::Sender<Result<User>>,
    },

    /// Get a user's jar set
    GetJars {
        /// Owning user
        user_id: Uuid,
        /// Reply channel
        response: oneshot::Sender<Result<Vec<Jar>>>,
    },

    /// Destructively replace a user's jar set
    ReplaceJars {
        /// Owning user
        user_id: Uuid,
        /// Full replacement jar set
        specs: Vec<JarSpec>,
        /// Reply channel
        response: oneshot::Sender<Result<Vec<Jar>>>,
    },

    /// Snapshot all pending transactions
    PendingSnapshot {
        /// Owning user
        user_id: Uuid,
        /// Reply channel
        response: oneshot::Sender<Result<Vec<Transaction>>>,
    },

    /// Settle a confirmed batch and append the settlement record
    ConfirmBatch {
        /// Owning user
        user_id: Uuid,
        /// Confirmation hash from the external ledger
        ledger_txn_hash: String,
        /// Identifiers the caller claims were committed
        transaction_ids: Vec<Uuid>,
        /// Merkle root the caller committed (base64)
        merkle_root: String,
        /// Reply channel; carries the updated transactions
        response: oneshot::Sender<Result<Vec<Transaction>>>,
    },

    /// Persist a new emergency request
    CreateEmergency {
        /// The request row (status Pending)
        request: EmergencyRequest,
        /// Reply channel
        response: oneshot::Sender<Result<EmergencyRequest>>,
    },

    /// Mark an emergency request as sent
    MarkEmergencySent {
        /// Request to update
        request_id: Uuid,
        /// Reply channel
        response: oneshot::Sender<Result<EmergencyRequest>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes ledger commands
pub struct LedgerActor {
    storage: Arc<Storage>,
    mailbox: mpsc::Receiver<LedgerCommand>,
    metrics: Metrics,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        storage: Arc<Storage>,
        mailbox: mpsc::Receiver<LedgerCommand>,
        metrics: Metrics,
    ) -> Self {
        Self {
            storage,
            mailbox,
            metrics,
        }
    }

    /// Run the actor event loop until shutdown or mailbox close
    pub async fn run(mut self) {
        while let Some(cmd) = self.mailbox.recv().await {
            match cmd {
                LedgerCommand::Shutdown => break,
                cmd => self.handle_command(cmd),
            }
        }
    }

    fn handle_command(&mut self, cmd: LedgerCommand) {
        match cmd {
            LedgerCommand::ConnectWallet {
                address,
                display_name,
                response,
            } => {
                let _ = response.send(self.connect_wallet(address, display_name));
            }

            LedgerCommand::Record {
                user_id,
                jar_id,
                amount,
                description,
                category,
                today,
                response,
            } => {
                let start = Instant::now();
                let result = self.record(user_id, jar_id, amount, description, category, today);
                if result.is_ok() {
                    self.metrics.record_transaction(start.elapsed().as_secs_f64());
                }
                let _ = response.send(result);
            }

            LedgerCommand::List {
                user_id,
                filter,
                response,
            } => {
                let _ = response.send(self.storage.list_transactions(user_id, &filter));
            }

            LedgerCommand::GetUser { user_id, response } => {
                let _ = response.send(self.storage.get_user(user_id));
            }

            LedgerCommand::GetJars { user_id, response } => {
                let _ = response.send(self.storage.user_jars(user_id));
            }

            LedgerCommand::ReplaceJars {
                user_id,
                specs,
                response,
            } => {
                let _ = response.send(self.replace_jars(user_id, specs));
            }

            LedgerCommand::PendingSnapshot { user_id, response } => {
                let _ = response.send(self.storage.pending_transactions(user_id));
            }

            LedgerCommand::ConfirmBatch {
                user_id,
                ledger_txn_hash,
                transaction_ids,
                merkle_root,
                response,
            } => {
                let result =
                    self.confirm_batch(user_id, ledger_txn_hash, transaction_ids, merkle_root);
                if let Ok(ref settled) = result {
                    self.metrics.record_settlement(settled.len() as u64);
                }
                let _ = response.send(result);
            }

            LedgerCommand::CreateEmergency { request, response } => {
                let result = self.storage.put_emergency(&request).map(|_| request);
                let _ = response.send(result);
            }

            LedgerCommand::MarkEmergencySent {
                request_id,
                response,
            } => {
                let _ = response.send(self.mark_emergency_sent(request_id));
            }

            LedgerCommand::Shutdown => {
                // Handled in main loop
            }
        }
    }

    fn connect_wallet(
        &self,
        address: WalletAddress,
        display_name: Option<String>,
    ) -> Result<User> {
        if let Some(mut user) = self.storage.find_user_by_address(&address)? {
            user.last_login = Utc::now();
            self.storage.put_user(&user)?;
            return Ok(user);
        }

        let user = User::new(address, display_name);
        let jars = Jar::defaults_for(user.user_id);
        self.storage.create_user_with_jars(&user, &jars)?;
        Ok(user)
    }

    fn record(
        &self,
        user_id: Uuid,
        jar_id: Option<Uuid>,
        amount: Decimal,
        description: String,
        category: String,
        today: NaiveDate,
    ) -> Result<RecordOutcome> {
        let mut user = self.storage.get_user(user_id)?;

        let jar = match jar_id {
            Some(jar_id) => {
                let mut jar = self.storage.get_jar(jar_id)?;
                if jar.user_id != user_id {
                    return Err(Error::JarNotFound(jar_id.to_string()));
                }
                jar.spent_amount += amount;
                Some(jar)
            }
            None => None,
        };

        let txn = Transaction {
            txn_id: Uuid::now_v7(),
            user_id,
            jar_id,
            amount,
            description,
            category,
            status: TransactionStatus::Pending,
            txn_hash: None,
            created_at: Utc::now(),
            settled_at: None,
        };

        let update = streak::advance(user.streak_count, user.last_streak_date, today);
        user.streak_count = update.streak_count;
        user.last_streak_date = Some(update.last_streak_date);

        self.storage
            .append_transaction_atomic(&txn, jar.as_ref(), &user)?;

        Ok(RecordOutcome {
            transaction: txn,
            jar,
            streak_count: update.streak_count,
        })
    }

    fn replace_jars(&self, user_id: Uuid, specs: Vec<JarSpec>) -> Result<Vec<Jar>> {
        // Existence check before the destructive replace
        self.storage.get_user(user_id)?;

        let old = self.storage.user_jars(user_id)?;
        let new: Vec<Jar> = specs
            .into_iter()
            .map(|spec| Jar::from_spec(user_id, spec))
            .collect();

        self.storage.replace_jars_atomic(user_id, &old, &new)?;
        Ok(new)
    }

    fn confirm_batch(
        &self,
        user_id: Uuid,
        ledger_txn_hash: String,
        transaction_ids: Vec<Uuid>,
        merkle_root: String,
    ) -> Result<Vec<Transaction>> {
        let mut sorted_ids = transaction_ids;
        sorted_ids.sort_unstable();

        // A duplicated id would pass the per-id guards (both fetches
        // see the still-pending row) and corrupt the settlement's id
        // set, so the shape is rejected before any row is read.
        if sorted_ids.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(Error::InvalidConfirmation(
                "Duplicate transaction id in confirmation set".to_string(),
            ));
        }

        // Recompute the root over the claimed id set; a mismatch means
        // the confirmation does not describe this batch.
        let computed = merkle::encode_root(&merkle::merkle_root(&sorted_ids));
        if computed != merkle_root {
            return Err(Error::ConfirmationMismatch(
                "Merkle root does not match the confirmed id set".to_string(),
            ));
        }

        let mut txns = Vec::with_capacity(sorted_ids.len());
        for txn_id in &sorted_ids {
            let txn = self
                .storage
                .get_transaction(*txn_id)
                .map_err(|_| Error::ConfirmationMismatch(format!("Unknown transaction {}", txn_id)))?;

            if txn.user_id != user_id {
                return Err(Error::ConfirmationMismatch(format!(
                    "Transaction {} does not belong to the confirming user",
                    txn_id
                )));
            }
            if txn.status != TransactionStatus::Pending {
                return Err(Error::ConfirmationMismatch(format!(
                    "Transaction {} is already settled",
                    txn_id
                )));
            }
            txns.push(txn);
        }

        let now = Utc::now();
        for txn in &mut txns {
            txn.status = TransactionStatus::Settled;
            txn.txn_hash = Some(ledger_txn_hash.clone());
            txn.settled_at = Some(now);
        }

        let settlement = Settlement {
            settlement_id: Uuid::now_v7(),
            user_id,
            merkle_root,
            ledger_txn_hash,
            transaction_ids: sorted_ids,
            settled_at: now,
        };

        self.storage.confirm_batch_atomic(&txns, &settlement)?;
        Ok(txns)
    }

    fn mark_emergency_sent(&self, request_id: Uuid) -> Result<EmergencyRequest> {
        let mut request = self.storage.get_emergency(request_id)?;
        request.status = EmergencyStatus::Sent;
        self.storage.put_emergency(&request)?;
        Ok(request)
    }
}

/// Handle for sending commands to the actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerCommand>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerCommand>) -> Self {
        Self { sender }
    }

    async fn send(&self, cmd: LedgerCommand) -> Result<()> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))
    }

    /// Authenticate a wallet address
    pub async fn connect_wallet(
        &self,
        address: WalletAddress,
        display_name: Option<String>,
    ) -> Result<User> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerCommand::ConnectWallet {
            address,
            display_name,
            response: tx,
        })
        .await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Record a spending event
    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        user_id: Uuid,
        jar_id: Option<Uuid>,
        amount: Decimal,
        description: String,
        category: String,
        today: NaiveDate,
    ) -> Result<RecordOutcome> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerCommand::Record {
            user_id,
            jar_id,
            amount,
            description,
            category,
            today,
            response: tx,
        })
        .await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// List transactions newest first
    pub async fn list(&self, user_id: Uuid, filter: TransactionFilter) -> Result<Vec<Transaction>> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerCommand::List {
            user_id,
            filter,
            response: tx,
        })
        .await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Get a user row
    pub async fn get_user(&self, user_id: Uuid) -> Result<User> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerCommand::GetUser {
            user_id,
            response: tx,
        })
        .await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Get a user's jar set
    pub async fn get_jars(&self, user_id: Uuid) -> Result<Vec<Jar>> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerCommand::GetJars {
            user_id,
            response: tx,
        })
        .await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Replace a user's jar set
    pub async fn replace_jars(&self, user_id: Uuid, specs: Vec<JarSpec>) -> Result<Vec<Jar>> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerCommand::ReplaceJars {
            user_id,
            specs,
            response: tx,
        })
        .await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Snapshot pending transactions
    pub async fn pending_snapshot(&self, user_id: Uuid) -> Result<Vec<Transaction>> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerCommand::PendingSnapshot {
            user_id,
            response: tx,
        })
        .await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Settle a confirmed batch; returns the updated transactions
    pub async fn confirm_batch(
        &self,
        user_id: Uuid,
        ledger_txn_hash: String,
        transaction_ids: Vec<Uuid>,
        merkle_root: String,
    ) -> Result<Vec<Transaction>> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerCommand::ConfirmBatch {
            user_id,
            ledger_txn_hash,
            transaction_ids,
            merkle_root,
            response: tx,
        })
        .await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Persist a new emergency request
    pub async fn create_emergency(&self, request: EmergencyRequest) -> Result<EmergencyRequest> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerCommand::CreateEmergency {
            request,
            response: tx,
        })
        .await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Mark an emergency request as sent
    pub async fn mark_emergency_sent(&self, request_id: Uuid) -> Result<EmergencyRequest> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerCommand::MarkEmergencySent {
            request_id,
            response: tx,
        })
        .await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.send(LedgerCommand::Shutdown).await
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    storage: Arc<Storage>,
    metrics: Metrics,
    mailbox_capacity: usize,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity);
    let actor = LedgerActor::new(storage, rx, metrics);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
