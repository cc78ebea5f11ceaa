//! Settlement orchestration
//!
//! Drives each operation end to end: validate through the ledger,
//! commit to the external network where the operation calls for it,
//! then push the resulting state to the user's connected devices.
//! Fan-out failures never roll back durable state; a device that
//! missed an event refetches on reconnect.

use crate::{
    chain::LedgerNetwork,
    commitment::{Commitment, PreparedSettlement},
    config::SettlementConfig,
    error::{Result, SettlementError},
    notifier::Notifier,
};
use chrono::Utc;
use ledger_core::{
    merkle, EmergencyRequest, Jar, JarSpec, Ledger, RecordOutcome, Transaction, TransactionFilter,
    User,
};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use sync_hub::{EventKind, Hub};
use tracing::{info, warn};
use uuid::Uuid;

/// Everything a completed settlement produced
#[derive(Debug)]
pub struct SettlementOutcome {
    /// The batch as prepared before submission
    pub prepared: PreparedSettlement,
    /// Confirmation hash from the external ledger
    pub ledger_txn_hash: String,
    /// The transactions after settlement was applied
    pub settled: Vec<Transaction>,
}

/// The settlement engine
pub struct SettlementEngine {
    ledger: Arc<Ledger>,
    hub: Arc<Hub>,
    network: Arc<dyn LedgerNetwork>,
    notifier: Arc<dyn Notifier>,
}

impl SettlementEngine {
    /// Assemble an engine over its collaborators. The engine owns the
    /// fan-out hub; sessions are created through [`Self::hub`].
    pub fn new(
        ledger: Arc<Ledger>,
        network: Arc<dyn LedgerNetwork>,
        notifier: Arc<dyn Notifier>,
        config: SettlementConfig,
    ) -> Result<Self> {
        config.validate()?;
        let hub = Arc::new(
            Hub::with_capacity(config.session_capacity)
                .map_err(|e| SettlementError::Config(format!("Hub metrics: {}", e)))?,
        );
        Ok(Self {
            ledger,
            hub,
            network,
            notifier,
        })
    }

    /// The underlying ledger
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// The fan-out hub
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Authenticate a wallet and push the jar set to the user's
    /// connected devices
    pub async fn connect_wallet(
        &self,
        address: &str,
        display_name: Option<String>,
    ) -> Result<(User, Vec<Jar>)> {
        let user = self.ledger.connect_wallet(address, display_name).await?;
        let jars = self.ledger.get_jars(user.user_id).await?;

        self.publish_jars(user.user_id, &jars);
        Ok((user, jars))
    }

    /// Record a spend and fan out the new transaction (and the moved
    /// jar set, if one was hit) to the user's devices
    pub async fn record_spend(
        &self,
        user_id: Uuid,
        jar_id: Option<Uuid>,
        amount: Decimal,
        description: String,
        category: String,
    ) -> Result<RecordOutcome> {
        let outcome = self
            .ledger
            .record(user_id, jar_id, amount, description, category)
            .await?;

        self.hub.publish(
            user_id,
            EventKind::TransactionSync,
            json!({
                "transaction": outcome.transaction,
                "streak_count": outcome.streak_count,
            }),
        );

        if outcome.jar.is_some() {
            let jars = self.ledger.get_jars(user_id).await?;
            self.publish_jars(user_id, &jars);
        }

        Ok(outcome)
    }

    /// Replace the user's jar set and push the result to their devices
    pub async fn replace_jars(&self, user_id: Uuid, specs: Vec<JarSpec>) -> Result<Vec<Jar>> {
        let jars = self.ledger.replace_jars(user_id, specs).await?;
        self.publish_jars(user_id, &jars);
        Ok(jars)
    }

    /// List a user's transactions, newest first
    pub async fn list_transactions(
        &self,
        user_id: Uuid,
        filter: TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        Ok(self.ledger.list_transactions(user_id, filter).await?)
    }

    /// Snapshot every pending transaction and build the batch
    /// commitment covering all of them. Mutates nothing; the batch
    /// only becomes settled once the network confirms it.
    pub async fn prepare_settlement(&self, user_id: Uuid) -> Result<PreparedSettlement> {
        let pending = self.ledger.pending_snapshot(user_id).await?;
        if pending.is_empty() {
            return Err(SettlementError::NothingToSettle);
        }

        let mut transaction_ids: Vec<Uuid> = pending.iter().map(|t| t.txn_id).collect();
        transaction_ids.sort_unstable();

        let merkle_root = merkle::encode_root(&merkle::merkle_root(&transaction_ids));
        let commitment = Commitment::new(merkle_root.clone(), transaction_ids.len(), Utc::now());

        info!(%user_id, count = transaction_ids.len(), %merkle_root, "Settlement prepared");

        Ok(PreparedSettlement {
            user_id,
            transaction_ids,
            merkle_root,
            commitment,
        })
    }

    /// Apply a network confirmation: marks the batch settled, appends
    /// the settlement record, and pushes each settled transaction to
    /// the user's devices
    pub async fn confirm_settlement(
        &self,
        prepared: &PreparedSettlement,
        ledger_txn_hash: String,
    ) -> Result<Vec<Transaction>> {
        let settled = self
            .ledger
            .confirm_batch(
                prepared.user_id,
                ledger_txn_hash.clone(),
                prepared.transaction_ids.clone(),
                prepared.merkle_root.clone(),
            )
            .await?;

        for txn in &settled {
            self.hub.publish(
                prepared.user_id,
                EventKind::TransactionSync,
                json!({ "transaction": txn }),
            );
        }

        info!(
            user_id = %prepared.user_id,
            count = settled.len(),
            %ledger_txn_hash,
            "Settlement confirmed"
        );
        Ok(settled)
    }

    /// Full settlement round: prepare, submit the commitment note to
    /// the external ledger, confirm the result
    pub async fn settle(&self, user_id: Uuid) -> Result<SettlementOutcome> {
        let prepared = self.prepare_settlement(user_id).await?;
        let user = self.ledger.get_user(user_id).await?;

        let note = prepared.commitment.to_bytes()?;
        let ledger_txn_hash = self.network.submit(&user.wallet_address, &note).await?;

        let settled = self.confirm_settlement(&prepared, ledger_txn_hash.clone()).await?;

        Ok(SettlementOutcome {
            prepared,
            ledger_txn_hash,
            settled,
        })
    }

    /// Read the user's external-ledger balance and push it to their
    /// devices
    pub async fn wallet_balance(&self, user_id: Uuid) -> Result<Decimal> {
        let user = self.ledger.get_user(user_id).await?;
        let balance = self.network.balance(&user.wallet_address).await?;

        self.hub
            .publish(user_id, EventKind::BalanceSync, json!({ "balance": balance }));
        Ok(balance)
    }

    /// File an emergency funding request and notify the guardian.
    /// The request is durable before the notification attempt; a
    /// notifier failure leaves it `Pending` for a later retry.
    pub async fn request_emergency_funds(
        &self,
        user_id: Uuid,
        guardian_contact: String,
        amount: Decimal,
        reason: String,
    ) -> Result<EmergencyRequest> {
        let user = self.ledger.get_user(user_id).await?;
        let request = self
            .ledger
            .create_emergency(user_id, guardian_contact.clone(), amount, reason.clone())
            .await?;

        let message = format!(
            "{} is requesting {} in emergency funds. Reason: {}",
            user.display_name, amount, reason
        );

        match self.notifier.send(&guardian_contact, &message).await {
            Ok(()) => Ok(self.ledger.mark_emergency_sent(request.request_id).await?),
            Err(e) => {
                warn!(
                    request_id = %request.request_id,
                    error = %e,
                    "Guardian notification failed, request stays pending"
                );
                Ok(request)
            }
        }
    }

    fn publish_jars(&self, user_id: Uuid, jars: &[Jar]) {
        self.hub
            .publish(user_id, EventKind::JarsSync, json!({ "jars": jars }));
    }
}
