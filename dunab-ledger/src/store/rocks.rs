//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - Account rows (key: account_id)
//! - `transactions` - Transaction records (key: transaction_id)
//! - `indices` - Secondary indices
//!   - `s` || student_id -> account_id
//!   - `a` || account_id || transaction_id -> empty
//! - `meta` - ID sequence high-water marks
//!
//! All integer keys are big-endian so iteration order equals ID order.

use super::{AccountDirectory, LedgerStore, TransactionFilter, TransactionLog};
use crate::account::Account;
use crate::transaction::TransactionRecord;
use crate::types::{AccountId, StudentId, TransactionId};
use crate::{Config, Error, Result};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, WriteOptions, DB,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_TRANSACTIONS: &str = "transactions";
const CF_INDICES: &str = "indices";
const CF_META: &str = "meta";

/// Index prefixes
const IDX_STUDENT: u8 = b's';
const IDX_ACCOUNT_TX: u8 = b'a';

/// Meta keys
const META_ACCOUNT_SEQ: &[u8] = b"account_seq";
const META_TRANSACTION_SEQ: &[u8] = b"transaction_seq";

/// RocksDB-backed [`LedgerStore`]
///
/// Reads are safe from any thread. The student uniqueness check in
/// [`save_account`](AccountDirectory::save_account) and [`commit`](LedgerStore::commit)
/// assumes a single writer, which the ledger actor guarantees.
pub struct RocksStore {
    db: Arc<DB>,
    sync_writes: bool,
    account_seq: AtomicU64,
    transaction_seq: AtomicU64,
}

impl RocksStore {
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
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_rows()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        let store = Self {
            db: Arc::new(db),
            sync_writes: config.rocksdb.sync_writes,
            account_seq: AtomicU64::new(0),
            transaction_seq: AtomicU64::new(0),
        };

        let account_seq = store.read_sequence(META_ACCOUNT_SEQ)?;
        let transaction_seq = store.read_sequence(META_TRANSACTION_SEQ)?;
        store.account_seq.store(account_seq, Ordering::SeqCst);
        store.transaction_seq.store(transaction_seq, Ordering::SeqCst);

        tracing::info!(
            path = ?path,
            account_seq,
            transaction_seq,
            "Opened RocksDB ledger store"
        );

        Ok(store)
    }

    // Column family options

    fn cf_options_rows() -> Options {
        let mut opts = Options::default();
        // Account rows are read on every request
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_log() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
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

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }

    fn read_sequence(&self, key: &[u8]) -> Result<u64> {
        let cf = self.cf_handle(CF_META)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    Error::Storage(format!(
                        "Corrupt sequence {}",
                        String::from_utf8_lossy(key)
                    ))
                })?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    fn check_student_owner(&self, account: &Account) -> Result<()> {
        let cf = self.cf_handle(CF_INDICES)?;
        if let Some(owner) = self.db.get_cf(cf, Self::index_key_student(account.student_id))? {
            if owner.as_slice() != account.account_id.to_key().as_slice() {
                return Err(Error::DuplicateAccount(account.student_id));
            }
        }
        Ok(())
    }

    fn stage_account(&self, batch: &mut WriteBatch, account: &Account) -> Result<()> {
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        batch.put_cf(cf_accounts, account.account_id.to_key(), bincode::serialize(account)?);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        batch.put_cf(
            cf_indices,
            Self::index_key_student(account.student_id),
            account.account_id.to_key(),
        );

        let cf_meta = self.cf_handle(CF_META)?;
        let high_water = self.account_seq.load(Ordering::SeqCst).max(account.account_id.value());
        batch.put_cf(cf_meta, META_ACCOUNT_SEQ, high_water.to_be_bytes());
        Ok(())
    }

    fn stage_transaction(&self, batch: &mut WriteBatch, record: &TransactionRecord) -> Result<()> {
        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;
        batch.put_cf(
            cf_transactions,
            record.transaction_id.to_key(),
            bincode::serialize(record)?,
        );

        let cf_indices = self.cf_handle(CF_INDICES)?;
        batch.put_cf(
            cf_indices,
            Self::index_key_account_tx(record.account_id, Some(record.transaction_id)),
            b"",
        );

        let cf_meta = self.cf_handle(CF_META)?;
        let high_water = self
            .transaction_seq
            .load(Ordering::SeqCst)
            .max(record.transaction_id.value());
        batch.put_cf(cf_meta, META_TRANSACTION_SEQ, high_water.to_be_bytes());
        Ok(())
    }

    /// Transaction IDs indexed under an account, ascending
    fn account_transaction_ids(&self, account_id: AccountId) -> Result<Vec<TransactionId>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let prefix = Self::index_key_account_tx(account_id, None);

        let mut ids = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix.as_slice(), Direction::Forward));
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let raw: [u8; 8] = key[prefix.len()..].try_into().map_err(|_| {
                Error::Storage(format!("Corrupt index key for {}", account_id))
            })?;
            ids.push(TransactionId::new(u64::from_be_bytes(raw)));
        }
        Ok(ids)
    }

    // Index key helpers

    fn index_key_student(student_id: StudentId) -> Vec<u8> {
        let mut key = vec![IDX_STUDENT];
        key.extend_from_slice(&student_id.to_key());
        key
    }

    fn index_key_account_tx(
        account_id: AccountId,
        transaction_id: Option<TransactionId>,
    ) -> Vec<u8> {
        let mut key = vec![IDX_ACCOUNT_TX];
        key.extend_from_slice(&account_id.to_key());
        if let Some(tx) = transaction_id {
            key.extend_from_slice(&tx.to_key());
        }
        key
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        self.db.flush()?;
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

impl AccountDirectory for RocksStore {
    fn find_account(&self, account_id: AccountId) -> Result<Option<Account>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        match self.db.get_cf(cf, account_id.to_key())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn find_account_by_student(&self, student_id: StudentId) -> Result<Option<Account>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let Some(owner) = self.db.get_cf(cf, Self::index_key_student(student_id))? else {
            return Ok(None);
        };

        let raw: [u8; 8] = owner.as_slice().try_into().map_err(|_| {
            Error::Storage(format!("Corrupt student index for {}", student_id))
        })?;
        self.find_account(AccountId::new(u64::from_be_bytes(raw)))
    }

    fn save_account(&self, account: &Account) -> Result<()> {
        self.check_student_owner(account)?;

        let mut batch = WriteBatch::default();
        self.stage_account(&mut batch, account)?;
        self.db.write_opt(batch, &self.write_options())?;

        tracing::debug!(
            account_id = %account.account_id,
            student_id = %account.student_id,
            status = %account.status,
            "Account saved"
        );
        Ok(())
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let mut accounts = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            accounts.push(bincode::deserialize(&value)?);
        }
        Ok(accounts)
    }
}

impl TransactionLog for RocksStore {
    fn save_transaction(&self, record: &TransactionRecord) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.stage_transaction(&mut batch, record)?;
        self.db.write_opt(batch, &self.write_options())?;
        Ok(())
    }

    fn find_transaction(&self, transaction_id: TransactionId) -> Result<Option<TransactionRecord>> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        match self.db.get_cf(cf, transaction_id.to_key())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn query_transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>> {
        let mut records = Vec::new();

        if let Some(account_id) = filter.account_id {
            for id in self.account_transaction_ids(account_id)?.into_iter().rev() {
                let record = self.find_transaction(id)?.ok_or_else(|| {
                    Error::Storage(format!("Index points at missing {}", id))
                })?;
                if filter.matches(&record) {
                    records.push(record);
                }
            }
            return Ok(records);
        }

        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        for item in self.db.iterator_cf(cf, IteratorMode::End) {
            let (_, value) = item?;
            let record: TransactionRecord = bincode::deserialize(&value)?;
            if filter.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }
}

impl LedgerStore for RocksStore {
    fn next_account_id(&self) -> Result<AccountId> {
        Ok(AccountId::new(self.account_seq.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn next_transaction_id(&self) -> Result<TransactionId> {
        Ok(TransactionId::new(
            self.transaction_seq.fetch_add(1, Ordering::SeqCst) + 1,
        ))
    }

    fn commit(&self, account: &Account, record: &TransactionRecord) -> Result<()> {
        if record.account_id != account.account_id {
            return Err(Error::InvalidOperation(format!(
                "{} does not belong to {}",
                record.transaction_id, account.account_id
            )));
        }
        self.check_student_owner(account)?;

        let mut batch = WriteBatch::default();
        self.stage_account(&mut batch, account)?;
        self.stage_transaction(&mut batch, record)?;

        // Atomic commit
        self.db.write_opt(batch, &self.write_options())?;

        tracing::debug!(
            transaction_id = %record.transaction_id,
            account_id = %account.account_id,
            balance = %account.balance,
            "Commit persisted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TransactionKind, TransactionStatus, UserId};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.rocksdb.sync_writes = false;
        (config, temp_dir)
    }

    fn test_account(id: u64, student: u64) -> Account {
        Account::open(
            AccountId::new(id),
            StudentId::new(student),
            Decimal::new(50000, 2),
            None,
            Utc::now(),
        )
        .unwrap()
    }

    fn test_record(id: u64, account: u64, kind: TransactionKind) -> TransactionRecord {
        let now = Utc::now();
        TransactionRecord {
            transaction_id: TransactionId::new(id),
            account_id: AccountId::new(account),
            kind,
            amount: Decimal::new(2500, 2),
            category_id: None,
            description: "cafeteria".to_string(),
            reference: None,
            status: TransactionStatus::Completed,
            balance_before: Decimal::new(50000, 2),
            balance_after: Decimal::new(47500, 2),
            created_by: UserId::new(1),
            void_reason: None,
            voided_by: None,
            voided_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_storage_open() {
        let (config, _temp) = test_config();
        let store = RocksStore::open(&config).unwrap();
        assert!(store.db.cf_handle(CF_ACCOUNTS).is_some());
        assert!(store.db.cf_handle(CF_TRANSACTIONS).is_some());
        assert!(store.db.cf_handle(CF_INDICES).is_some());
        assert!(store.db.cf_handle(CF_META).is_some());
    }

    #[test]
    fn test_account_roundtrip_and_student_index() {
        let (config, _temp) = test_config();
        let store = RocksStore::open(&config).unwrap();

        let account = test_account(1, 42);
        store.save_account(&account).unwrap();

        assert_eq!(store.find_account(AccountId::new(1)).unwrap(), Some(account.clone()));
        assert_eq!(
            store.find_account_by_student(StudentId::new(42)).unwrap(),
            Some(account)
        );
        assert!(store.find_account_by_student(StudentId::new(7)).unwrap().is_none());

        let dup = store.save_account(&test_account(2, 42));
        assert!(matches!(dup, Err(Error::DuplicateAccount(_))));
    }

    #[test]
    fn test_commit_is_atomic_unit() {
        let (config, _temp) = test_config();
        let store = RocksStore::open(&config).unwrap();

        let mut account = test_account(1, 42);
        account.debit(Decimal::new(2500, 2)).unwrap();
        let record = test_record(1, 1, TransactionKind::Debit);
        store.commit(&account, &record).unwrap();

        let stored = store.find_account(AccountId::new(1)).unwrap().unwrap();
        assert_eq!(stored.balance, Decimal::new(47500, 2));
        assert_eq!(store.find_transaction(TransactionId::new(1)).unwrap(), Some(record));

        // Mismatched pair writes nothing
        let foreign = test_record(2, 9, TransactionKind::Credit);
        assert!(store.commit(&account, &foreign).is_err());
        assert!(store.find_transaction(TransactionId::new(2)).unwrap().is_none());
    }

    #[test]
    fn test_query_newest_first_with_index() {
        let (config, _temp) = test_config();
        let store = RocksStore::open(&config).unwrap();

        let a = test_account(1, 10);
        let b = test_account(2, 20);
        store.commit(&a, &test_record(1, 1, TransactionKind::Credit)).unwrap();
        store.commit(&b, &test_record(2, 2, TransactionKind::Credit)).unwrap();
        store.commit(&a, &test_record(3, 1, TransactionKind::Debit)).unwrap();

        let ids: Vec<u64> = store
            .query_transactions(&TransactionFilter::for_account(AccountId::new(1)))
            .unwrap()
            .iter()
            .map(|r| r.transaction_id.value())
            .collect();
        assert_eq!(ids, vec![3, 1]);

        let credits: Vec<u64> = store
            .query_transactions(&TransactionFilter::all().kind(TransactionKind::Credit))
            .unwrap()
            .iter()
            .map(|r| r.transaction_id.value())
            .collect();
        assert_eq!(credits, vec![2, 1]);
    }

    #[test]
    fn test_sequences_survive_reopen() {
        let (config, _temp) = test_config();
        {
            let store = RocksStore::open(&config).unwrap();
            let account_id = store.next_account_id().unwrap();
            let account = test_account(account_id.value(), 10);
            let tx = store.next_transaction_id().unwrap();
            let record = test_record(tx.value(), account_id.value(), TransactionKind::Credit);
            store.commit(&account, &record).unwrap();
            store.close().unwrap();
        }

        let store = RocksStore::open(&config).unwrap();
        assert_eq!(store.next_account_id().unwrap(), AccountId::new(2));
        assert_eq!(store.next_transaction_id().unwrap(), TransactionId::new(2));
        assert_eq!(store.list_accounts().unwrap().len(), 1);
    }
}
