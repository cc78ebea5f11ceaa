//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `users` - User rows (key: user_id)
//! - `jars` - Jar rows (key: jar_id)
//! - `transactions` - Spending events (key: txn_id)
//! - `settlements` - Append-only settlement records (key: settlement_id)
//! - `emergency` - Emergency fund requests (key: request_id)
//! - `indices` - Secondary indices (wallet lookup, jar ownership,
//!   reverse-time transaction listing)
//!
//! Every mutation that touches more than one row goes through a single
//! `WriteBatch`; partial visibility of such a unit is never observable.

use crate::{
    error::{Error, Result},
    types::{
        EmergencyRequest, Jar, Settlement, Transaction, TransactionFilter, TransactionStatus,
        User, WalletAddress,
    },
    Config,
};
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, WriteBatch, DB};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_USERS: &str = "users";
const CF_JARS: &str = "jars";
const CF_TRANSACTIONS: &str = "transactions";
const CF_SETTLEMENTS: &str = "settlements";
const CF_EMERGENCY: &str = "emergency";
const CF_INDICES: &str = "indices";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_USERS, Options::default()),
            ColumnFamilyDescriptor::new(CF_JARS, Options::default()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_transactions()),
            ColumnFamilyDescriptor::new(CF_SETTLEMENTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_EMERGENCY, Options::default()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = %path.display(), "Opened ledger store");

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_transactions() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Index key helpers

    fn wallet_index_key(address: &WalletAddress) -> Vec<u8> {
        let mut key = b"w|".to_vec();
        key.extend_from_slice(address.as_str().as_bytes());
        key
    }

    fn jar_index_prefix(user_id: Uuid) -> Vec<u8> {
        let mut key = b"j|".to_vec();
        key.extend_from_slice(user_id.as_bytes());
        key
    }

    fn jar_index_key(user_id: Uuid, jar_id: Uuid) -> Vec<u8> {
        let mut key = Self::jar_index_prefix(user_id);
        key.extend_from_slice(jar_id.as_bytes());
        key
    }

    fn txn_index_prefix(user_id: Uuid) -> Vec<u8> {
        let mut key = b"t|".to_vec();
        key.extend_from_slice(user_id.as_bytes());
        key
    }

    /// Reverse-timestamp index key: ascending iteration over the
    /// prefix yields transactions newest first.
    fn txn_index_key(user_id: Uuid, created_at: DateTime<Utc>, txn_id: Uuid) -> Vec<u8> {
        let inverted = u64::MAX - created_at.timestamp_nanos_opt().unwrap_or(0) as u64;
        let mut key = Self::txn_index_prefix(user_id);
        key.extend_from_slice(&inverted.to_be_bytes());
        key.extend_from_slice(txn_id.as_bytes());
        key
    }

    // User operations

    /// Insert a new user together with their starting jar set (atomic).
    pub fn create_user_with_jars(&self, user: &User, jars: &[Jar]) -> Result<()> {
        let cf_users = self.cf_handle(CF_USERS)?;
        let cf_jars = self.cf_handle(CF_JARS)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(cf_users, user.user_id.as_bytes(), bincode::serialize(user)?);
        batch.put_cf(
            cf_indices,
            Self::wallet_index_key(&user.wallet_address),
            user.user_id.as_bytes(),
        );

        for jar in jars {
            batch.put_cf(cf_jars, jar.jar_id.as_bytes(), bincode::serialize(jar)?);
            batch.put_cf(cf_indices, Self::jar_index_key(user.user_id, jar.jar_id), []);
        }

        self.db.write(batch)?;

        tracing::info!(
            user_id = %user.user_id,
            wallet = %user.wallet_address,
            jars = jars.len(),
            "User created"
        );

        Ok(())
    }

    /// Get user by ID
    pub fn get_user(&self, user_id: Uuid) -> Result<User> {
        let cf = self.cf_handle(CF_USERS)?;
        let value = self
            .db
            .get_cf(cf, user_id.as_bytes())?
            .ok_or_else(|| Error::UserNotFound(user_id.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Look up a user by wallet address (via index)
    pub fn find_user_by_address(&self, address: &WalletAddress) -> Result<Option<User>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let id_bytes = match self.db.get_cf(cf_indices, Self::wallet_index_key(address))? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        let id_bytes: [u8; 16] = id_bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::Storage("Corrupt wallet index entry".to_string()))?;

        Ok(Some(self.get_user(Uuid::from_bytes(id_bytes))?))
    }

    /// Overwrite a user row (login refresh, streak update)
    pub fn put_user(&self, user: &User) -> Result<()> {
        let cf = self.cf_handle(CF_USERS)?;
        self.db
            .put_cf(cf, user.user_id.as_bytes(), bincode::serialize(user)?)?;
        Ok(())
    }

    // Jar operations

    /// Get jar by ID
    pub fn get_jar(&self, jar_id: Uuid) -> Result<Jar> {
        let cf = self.cf_handle(CF_JARS)?;
        let value = self
            .db
            .get_cf(cf, jar_id.as_bytes())?
            .ok_or_else(|| Error::JarNotFound(jar_id.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// All jars belonging to a user, oldest first
    pub fn user_jars(&self, user_id: Uuid) -> Result<Vec<Jar>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let prefix = Self::jar_index_prefix(user_id);

        let mut jars = Vec::new();
        for item in self.db.prefix_iterator_cf(cf_indices, &prefix) {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let jar_bytes: [u8; 16] = key[prefix.len()..]
                .try_into()
                .map_err(|_| Error::Storage("Corrupt jar index entry".to_string()))?;
            jars.push(self.get_jar(Uuid::from_bytes(jar_bytes))?);
        }

        jars.sort_by_key(|j| j.created_at);
        Ok(jars)
    }

    /// Replace a user's entire jar set (atomic delete + insert).
    pub fn replace_jars_atomic(&self, user_id: Uuid, old: &[Jar], new: &[Jar]) -> Result<()> {
        let cf_jars = self.cf_handle(CF_JARS)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let mut batch = WriteBatch::default();
        for jar in old {
            batch.delete_cf(cf_jars, jar.jar_id.as_bytes());
            batch.delete_cf(cf_indices, Self::jar_index_key(user_id, jar.jar_id));
        }
        for jar in new {
            batch.put_cf(cf_jars, jar.jar_id.as_bytes(), bincode::serialize(jar)?);
            batch.put_cf(cf_indices, Self::jar_index_key(user_id, jar.jar_id), []);
        }

        self.db.write(batch)?;

        tracing::info!(%user_id, removed = old.len(), added = new.len(), "Jar set replaced");
        Ok(())
    }

    // Transaction operations

    /// Append a spending event, the jar it touched, and the owner's
    /// streak state in one atomic unit.
    pub fn append_transaction_atomic(
        &self,
        txn: &Transaction,
        jar: Option<&Jar>,
        user: &User,
    ) -> Result<()> {
        let cf_txns = self.cf_handle(CF_TRANSACTIONS)?;
        let cf_jars = self.cf_handle(CF_JARS)?;
        let cf_users = self.cf_handle(CF_USERS)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(cf_txns, txn.txn_id.as_bytes(), bincode::serialize(txn)?);
        batch.put_cf(
            cf_indices,
            Self::txn_index_key(txn.user_id, txn.created_at, txn.txn_id),
            [],
        );
        if let Some(jar) = jar {
            batch.put_cf(cf_jars, jar.jar_id.as_bytes(), bincode::serialize(jar)?);
        }
        batch.put_cf(cf_users, user.user_id.as_bytes(), bincode::serialize(user)?);

        self.db.write(batch)?;

        tracing::debug!(
            txn_id = %txn.txn_id,
            user_id = %txn.user_id,
            amount = %txn.amount,
            "Transaction recorded"
        );

        Ok(())
    }

    /// Get transaction by ID
    pub fn get_transaction(&self, txn_id: Uuid) -> Result<Transaction> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let value = self
            .db
            .get_cf(cf, txn_id.as_bytes())?
            .ok_or_else(|| Error::TransactionNotFound(txn_id.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// List a user's transactions newest first, with status filter and
    /// offset/limit paging applied after the filter.
    pub fn list_transactions(
        &self,
        user_id: Uuid,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let prefix = Self::txn_index_prefix(user_id);

        let mut matched = 0usize;
        let mut out = Vec::new();
        if filter.limit == 0 {
            return Ok(out);
        }

        for item in self.db.prefix_iterator_cf(cf_indices, &prefix) {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let id_start = prefix.len() + 8;
            let txn_bytes: [u8; 16] = key[id_start..]
                .try_into()
                .map_err(|_| Error::Storage("Corrupt transaction index entry".to_string()))?;
            let txn = self.get_transaction(Uuid::from_bytes(txn_bytes))?;

            if let Some(status) = filter.status {
                if txn.status != status {
                    continue;
                }
            }

            matched += 1;
            if matched <= filter.offset {
                continue;
            }
            out.push(txn);
            if out.len() >= filter.limit {
                break;
            }
        }

        Ok(out)
    }

    /// Snapshot of every pending transaction for a user.
    pub fn pending_transactions(&self, user_id: Uuid) -> Result<Vec<Transaction>> {
        self.list_transactions(
            user_id,
            &TransactionFilter {
                status: Some(TransactionStatus::Pending),
                limit: usize::MAX,
                offset: 0,
            },
        )
    }

    // Settlement operations

    /// Mark a batch of transactions settled and append the settlement
    /// record, all-or-nothing.
    pub fn confirm_batch_atomic(
        &self,
        txns: &[Transaction],
        settlement: &Settlement,
    ) -> Result<()> {
        let cf_txns = self.cf_handle(CF_TRANSACTIONS)?;
        let cf_settlements = self.cf_handle(CF_SETTLEMENTS)?;

        let mut batch = WriteBatch::default();
        for txn in txns {
            batch.put_cf(cf_txns, txn.txn_id.as_bytes(), bincode::serialize(txn)?);
        }
        batch.put_cf(
            cf_settlements,
            settlement.settlement_id.as_bytes(),
            bincode::serialize(settlement)?,
        );

        self.db.write(batch)?;

        tracing::info!(
            settlement_id = %settlement.settlement_id,
            user_id = %settlement.user_id,
            count = txns.len(),
            merkle_root = %settlement.merkle_root,
            "Settlement confirmed"
        );

        Ok(())
    }

    /// Get settlement by ID
    pub fn get_settlement(&self, settlement_id: Uuid) -> Result<Settlement> {
        let cf = self.cf_handle(CF_SETTLEMENTS)?;
        let value = self
            .db
            .get_cf(cf, settlement_id.as_bytes())?
            .ok_or_else(|| Error::Storage(format!("Settlement {} not found", settlement_id)))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// All settlement records for a user. Full scan; settlement rows
    /// are few per user.
    pub fn user_settlements(&self, user_id: Uuid) -> Result<Vec<Settlement>> {
        let cf = self.cf_handle(CF_SETTLEMENTS)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_, value) = item?;
            let settlement: Settlement = bincode::deserialize(&value)?;
            if settlement.user_id == user_id {
                out.push(settlement);
            }
        }
        Ok(out)
    }

    // Emergency request operations

    /// Insert or overwrite an emergency request row
    pub fn put_emergency(&self, request: &EmergencyRequest) -> Result<()> {
        let cf = self.cf_handle(CF_EMERGENCY)?;
        self.db
            .put_cf(cf, request.request_id.as_bytes(), bincode::serialize(request)?)?;
        Ok(())
    }

    /// Get emergency request by ID
    pub fn get_emergency(&self, request_id: Uuid) -> Result<EmergencyRequest> {
        let cf = self.cf_handle(CF_EMERGENCY)?;
        let value = self
            .db
            .get_cf(cf, request_id.as_bytes())?
            .ok_or_else(|| Error::Storage(format!("Emergency request {} not found", request_id)))?;
        Ok(bincode::deserialize(&value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmergencyStatus, JarSpec};
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn test_user() -> User {
        User::new(WalletAddress::new(format!("WALLET{}", Uuid::new_v4())), None)
    }

    fn test_txn(user_id: Uuid, jar_id: Option<Uuid>, amount: i64) -> Transaction {
        Transaction {
            txn_id: Uuid::now_v7(),
            user_id,
            jar_id,
            amount: Decimal::from(amount),
            description: "test".to_string(),
            category: "food".to_string(),
            status: TransactionStatus::Pending,
            txn_hash: None,
            created_at: Utc::now(),
            settled_at: None,
        }
    }

    #[test]
    fn test_create_and_find_user() {
        let (storage, _temp) = test_storage();
        let user = test_user();
        let jars = Jar::defaults_for(user.user_id);

        storage.create_user_with_jars(&user, &jars).unwrap();

        let by_id = storage.get_user(user.user_id).unwrap();
        assert_eq!(by_id.wallet_address, user.wallet_address);

        let by_addr = storage
            .find_user_by_address(&user.wallet_address)
            .unwrap()
            .unwrap();
        assert_eq!(by_addr.user_id, user.user_id);

        assert_eq!(storage.user_jars(user.user_id).unwrap().len(), 4);
    }

    #[test]
    fn test_unknown_address_is_none() {
        let (storage, _temp) = test_storage();
        let found = storage
            .find_user_by_address(&WalletAddress::new("UNKNOWN"))
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_atomic_record_updates_jar_and_user() {
        let (storage, _temp) = test_storage();
        let mut user = test_user();
        let jars = Jar::defaults_for(user.user_id);
        storage.create_user_with_jars(&user, &jars).unwrap();

        let mut jar = jars[0].clone();
        jar.spent_amount += Decimal::from(500);
        user.streak_count = 1;

        let txn = test_txn(user.user_id, Some(jar.jar_id), 500);
        storage
            .append_transaction_atomic(&txn, Some(&jar), &user)
            .unwrap();

        assert_eq!(
            storage.get_jar(jar.jar_id).unwrap().spent_amount,
            Decimal::from(500)
        );
        assert_eq!(storage.get_user(user.user_id).unwrap().streak_count, 1);
        assert_eq!(
            storage.get_transaction(txn.txn_id).unwrap().txn_id,
            txn.txn_id
        );
    }

    #[test]
    fn test_list_newest_first_with_paging() {
        let (storage, _temp) = test_storage();
        let user = test_user();
        storage.create_user_with_jars(&user, &[]).unwrap();

        let mut ids = Vec::new();
        for i in 0..5 {
            let mut txn = test_txn(user.user_id, None, 100 + i);
            // Distinct timestamps so ordering is deterministic
            txn.created_at = Utc::now() + chrono::Duration::milliseconds(i);
            storage
                .append_transaction_atomic(&txn, None, &user)
                .unwrap();
            ids.push(txn.txn_id);
        }

        let all = storage
            .list_transactions(user.user_id, &TransactionFilter::default())
            .unwrap();
        assert_eq!(all.len(), 5);
        // Newest first: last inserted id leads
        assert_eq!(all[0].txn_id, ids[4]);
        assert_eq!(all[4].txn_id, ids[0]);

        let page = storage
            .list_transactions(
                user.user_id,
                &TransactionFilter {
                    status: None,
                    limit: 2,
                    offset: 2,
                },
            )
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].txn_id, ids[2]);

        let empty = storage
            .list_transactions(
                user.user_id,
                &TransactionFilter {
                    status: None,
                    limit: 0,
                    offset: 0,
                },
            )
            .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_confirm_batch_atomic() {
        let (storage, _temp) = test_storage();
        let user = test_user();
        storage.create_user_with_jars(&user, &[]).unwrap();

        let mut txns = vec![
            test_txn(user.user_id, None, 100),
            test_txn(user.user_id, None, 200),
        ];
        for txn in &txns {
            storage
                .append_transaction_atomic(txn, None, &user)
                .unwrap();
        }

        let now = Utc::now();
        for txn in &mut txns {
            txn.status = TransactionStatus::Settled;
            txn.txn_hash = Some("CHAINHASH".to_string());
            txn.settled_at = Some(now);
        }

        let settlement = Settlement {
            settlement_id: Uuid::now_v7(),
            user_id: user.user_id,
            merkle_root: "root".to_string(),
            ledger_txn_hash: "CHAINHASH".to_string(),
            transaction_ids: txns.iter().map(|t| t.txn_id).collect(),
            settled_at: now,
        };

        storage.confirm_batch_atomic(&txns, &settlement).unwrap();

        assert!(storage.pending_transactions(user.user_id).unwrap().is_empty());
        assert_eq!(storage.user_settlements(user.user_id).unwrap().len(), 1);
        let stored = storage.get_settlement(settlement.settlement_id).unwrap();
        assert_eq!(stored.transaction_ids.len(), 2);
    }

    #[test]
    fn test_replace_jars() {
        let (storage, _temp) = test_storage();
        let user = test_user();
        let jars = Jar::defaults_for(user.user_id);
        storage.create_user_with_jars(&user, &jars).unwrap();

        let new_jars: Vec<Jar> = vec![Jar::from_spec(
            user.user_id,
            JarSpec {
                name: "Rent".to_string(),
                budget_amount: Decimal::from(12000),
                spent_amount: Decimal::from(3000),
                color: "#333333".to_string(),
                icon: "home".to_string(),
            },
        )];

        storage
            .replace_jars_atomic(user.user_id, &jars, &new_jars)
            .unwrap();

        let current = storage.user_jars(user.user_id).unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].name, "Rent");
        assert_eq!(current[0].spent_amount, Decimal::from(3000));
    }

    #[test]
    fn test_emergency_roundtrip() {
        let (storage, _temp) = test_storage();
        let user = test_user();

        let request = EmergencyRequest {
            request_id: Uuid::now_v7(),
            user_id: user.user_id,
            guardian_contact: "+15550100".to_string(),
            amount: Decimal::from(900),
            reason: "medical".to_string(),
            status: EmergencyStatus::Pending,
            created_at: Utc::now(),
        };

        storage.put_emergency(&request).unwrap();
        let stored = storage.get_emergency(request.request_id).unwrap();
        assert_eq!(stored.status, EmergencyStatus::Pending);
    }
}
