//! End-to-end settlement flow over a real ledger with mocked network
//! and notifier collaborators

use async_trait::async_trait;
use ledger_core::{Config, EmergencyStatus, Ledger, TransactionStatus, WalletAddress};
use rust_decimal::Decimal;
use settlement::{
    LedgerNetwork, Notifier, Result as SettlementResult, SettlementConfig, SettlementEngine,
    SettlementError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use sync_hub::{CredentialVerifier, EventKind, HubError};
use uuid::Uuid;

/// Records every submitted note and hands back deterministic hashes
#[derive(Default)]
struct MockNetwork {
    submissions: Mutex<Vec<Vec<u8>>>,
    counter: AtomicUsize,
}

#[async_trait]
impl LedgerNetwork for MockNetwork {
    async fn submit(&self, _from: &WalletAddress, note: &[u8]) -> SettlementResult<String> {
        self.submissions.lock().unwrap().push(note.to_vec());
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("MOCKHASH{}", n))
    }

    async fn balance(&self, _address: &WalletAddress) -> SettlementResult<Decimal> {
        Ok(Decimal::from(12_345))
    }
}

#[derive(Default)]
struct MockNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, contact: &str, message: &str) -> SettlementResult<()> {
        if self.fail {
            return Err(SettlementError::Notifier("provider down".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((contact.to_string(), message.to_string()));
        Ok(())
    }
}

/// Accepts credentials of the form `user:{uuid}`
struct PrefixVerifier;

impl CredentialVerifier for PrefixVerifier {
    fn verify(&self, credential: &str) -> sync_hub::Result<Uuid> {
        credential
            .strip_prefix("user:")
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| HubError::Unauthenticated("Bad credential".to_string()))
    }
}

struct Harness {
    engine: SettlementEngine,
    network: Arc<MockNetwork>,
    notifier: Arc<MockNotifier>,
    _temp: tempfile::TempDir,
}

fn harness_with_notifier(notifier: MockNotifier) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let temp = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp.path().to_path_buf();

    let ledger = Arc::new(Ledger::open(&config).unwrap());
    let network = Arc::new(MockNetwork::default());
    let notifier = Arc::new(notifier);

    let engine = SettlementEngine::new(
        ledger,
        network.clone(),
        notifier.clone(),
        SettlementConfig::default(),
    )
    .unwrap();

    Harness {
        engine,
        network,
        notifier,
        _temp: temp,
    }
}

fn harness() -> Harness {
    harness_with_notifier(MockNotifier::default())
}

#[tokio::test]
async fn test_full_settlement_round() {
    let h = harness();

    let (user, jars) = h
        .engine
        .connect_wallet("JARWALLET100", Some("Asha".to_string()))
        .await
        .unwrap();
    assert_eq!(jars.len(), 4);
    let food = jars.iter().find(|j| j.name == "Food & Dining").unwrap();

    // A connected device sees every event from here on
    let mut device = h
        .engine
        .hub()
        .authenticate(&PrefixVerifier, &format!("user:{}", user.user_id))
        .unwrap();

    let outcome = h
        .engine
        .record_spend(
            user.user_id,
            Some(food.jar_id),
            Decimal::from(500),
            "groceries".to_string(),
            "food".to_string(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.streak_count, 1);
    assert_eq!(
        outcome.jar.as_ref().unwrap().spent_amount,
        Decimal::from(500)
    );

    // TransactionSync then JarsSync
    let first = device.receiver.recv().await.unwrap();
    assert_eq!(first.kind, EventKind::TransactionSync);
    assert_eq!(first.payload["streak_count"], 1);
    let second = device.receiver.recv().await.unwrap();
    assert_eq!(second.kind, EventKind::JarsSync);

    let result = h.engine.settle(user.user_id).await.unwrap();
    assert_eq!(result.settled.len(), 1);
    assert_eq!(result.ledger_txn_hash, "MOCKHASH0");
    assert!(result
        .settled
        .iter()
        .all(|t| t.status == TransactionStatus::Settled));
    assert_eq!(
        result.settled[0].txn_hash.as_deref(),
        Some("MOCKHASH0")
    );

    // The note carried the root, count, and discriminator
    let submissions = h.network.submissions.lock().unwrap();
    let note: serde_json::Value = serde_json::from_slice(&submissions[0]).unwrap();
    assert_eq!(note["kind"], "JARCASH_SETTLEMENT");
    assert_eq!(note["merkle_root"], result.prepared.merkle_root.as_str());
    assert_eq!(note["count"], 1);
    drop(submissions);

    // One TransactionSync per settled transaction
    let settled_event = device.receiver.recv().await.unwrap();
    assert_eq!(settled_event.kind, EventKind::TransactionSync);
    assert_eq!(settled_event.payload["transaction"]["status"], "Settled");

    // The settlement record is durable and queryable
    let settlements = h.engine.ledger().user_settlements(user.user_id).unwrap();
    assert_eq!(settlements.len(), 1);
    assert_eq!(settlements[0].merkle_root, result.prepared.merkle_root);
    assert_eq!(settlements[0].transaction_ids, result.prepared.transaction_ids);
}

#[tokio::test]
async fn test_confirming_the_same_batch_twice_is_a_conflict() {
    let h = harness();
    let (user, _) = h.engine.connect_wallet("JARWALLET101", None).await.unwrap();

    h.engine
        .record_spend(
            user.user_id,
            None,
            Decimal::from(100),
            String::new(),
            "misc".to_string(),
        )
        .await
        .unwrap();

    let prepared = h.engine.prepare_settlement(user.user_id).await.unwrap();
    h.engine
        .confirm_settlement(&prepared, "HASH_A".to_string())
        .await
        .unwrap();

    let err = h
        .engine
        .confirm_settlement(&prepared, "HASH_B".to_string())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SettlementError::Ledger(ledger_core::Error::ConfirmationMismatch(_))
    ));
}

#[tokio::test]
async fn test_prepare_with_nothing_pending() {
    let h = harness();
    let (user, _) = h.engine.connect_wallet("JARWALLET102", None).await.unwrap();

    let err = h.engine.prepare_settlement(user.user_id).await.unwrap_err();
    assert!(matches!(err, SettlementError::NothingToSettle));
}

#[tokio::test]
async fn test_prepare_covers_every_pending_transaction() {
    let h = harness();
    let (user, _) = h.engine.connect_wallet("JARWALLET107", None).await.unwrap();

    let mut recorded = Vec::new();
    for i in 1..=5u32 {
        let outcome = h
            .engine
            .record_spend(
                user.user_id,
                None,
                Decimal::from(i * 10),
                String::new(),
                "misc".to_string(),
            )
            .await
            .unwrap();
        recorded.push(outcome.transaction.txn_id);
    }

    let prepared = h.engine.prepare_settlement(user.user_id).await.unwrap();
    assert_eq!(prepared.transaction_ids.len(), recorded.len());

    recorded.sort_unstable();
    assert_eq!(prepared.transaction_ids, recorded);
    assert_eq!(prepared.commitment.count, recorded.len());
}

#[tokio::test]
async fn test_prepare_does_not_mutate() {
    let h = harness();
    let (user, _) = h.engine.connect_wallet("JARWALLET103", None).await.unwrap();

    h.engine
        .record_spend(
            user.user_id,
            None,
            Decimal::from(250),
            String::new(),
            "misc".to_string(),
        )
        .await
        .unwrap();

    let first = h.engine.prepare_settlement(user.user_id).await.unwrap();
    let second = h.engine.prepare_settlement(user.user_id).await.unwrap();
    assert_eq!(first.transaction_ids, second.transaction_ids);
    assert_eq!(first.merkle_root, second.merkle_root);

    let pending = h
        .engine
        .ledger()
        .pending_snapshot(user.user_id)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn test_emergency_request_notifies_guardian() {
    let h = harness();
    let (user, _) = h.engine.connect_wallet("JARWALLET104", None).await.unwrap();

    let request = h
        .engine
        .request_emergency_funds(
            user.user_id,
            "+15550001111".to_string(),
            Decimal::from(2000),
            "medical".to_string(),
        )
        .await
        .unwrap();
    assert_eq!(request.status, EmergencyStatus::Sent);

    let sent = h.notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "+15550001111");
    assert!(sent[0].1.contains("2000"));
    assert!(sent[0].1.contains("medical"));
}

#[tokio::test]
async fn test_emergency_request_survives_notifier_failure() {
    let h = harness_with_notifier(MockNotifier {
        fail: true,
        ..Default::default()
    });
    let (user, _) = h.engine.connect_wallet("JARWALLET105", None).await.unwrap();

    let request = h
        .engine
        .request_emergency_funds(
            user.user_id,
            "+15550002222".to_string(),
            Decimal::from(500),
            "rent".to_string(),
        )
        .await
        .unwrap();

    // Durable but unsent; a retry can pick it up later
    assert_eq!(request.status, EmergencyStatus::Pending);
}

#[tokio::test]
async fn test_wallet_balance_fans_out() {
    let h = harness();
    let (user, _) = h.engine.connect_wallet("JARWALLET106", None).await.unwrap();

    let mut device = h
        .engine
        .hub()
        .authenticate(&PrefixVerifier, &format!("user:{}", user.user_id))
        .unwrap();

    let balance = h.engine.wallet_balance(user.user_id).await.unwrap();
    assert_eq!(balance, Decimal::from(12_345));

    let event = device.receiver.recv().await.unwrap();
    assert_eq!(event.kind, EventKind::BalanceSync);
    // Decimal serializes as a string to preserve precision
    assert_eq!(event.payload["balance"], serde_json::json!("12345"));
}
