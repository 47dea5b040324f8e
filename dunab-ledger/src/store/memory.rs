//! In-memory store
//!
//! Thread-safe implementation of the storage traits, used for tests and
//! development. One `RwLock` guards every table so a commit is atomic with
//! respect to readers.

use super::{AccountDirectory, LedgerStore, TransactionFilter, TransactionLog};
use crate::account::Account;
use crate::transaction::TransactionRecord;
use crate::types::{AccountId, StudentId, TransactionId};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    transactions: BTreeMap<TransactionId, TransactionRecord>,
    student_index: HashMap<StudentId, AccountId>,
    account_seq: u64,
    transaction_seq: u64,
}

impl Tables {
    fn upsert_account(&mut self, account: &Account) -> Result<()> {
        if let Some(owner) = self.student_index.get(&account.student_id) {
            if *owner != account.account_id {
                return Err(Error::DuplicateAccount(account.student_id));
            }
        }

        self.student_index
            .insert(account.student_id, account.account_id);
        self.accounts.insert(account.account_id, account.clone());
        Ok(())
    }
}

/// Memory-backed [`LedgerStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all data
    pub fn clear(&self) {
        *self.tables.write() = Tables::default();
    }
}

impl AccountDirectory for MemoryStore {
    fn find_account(&self, account_id: AccountId) -> Result<Option<Account>> {
        Ok(self.tables.read().accounts.get(&account_id).cloned())
    }

    fn find_account_by_student(&self, student_id: StudentId) -> Result<Option<Account>> {
        let tables = self.tables.read();
        Ok(tables
            .student_index
            .get(&student_id)
            .and_then(|id| tables.accounts.get(id))
            .cloned())
    }

    fn save_account(&self, account: &Account) -> Result<()> {
        self.tables.write().upsert_account(account)
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.tables.read().accounts.values().cloned().collect())
    }
}

impl TransactionLog for MemoryStore {
    fn save_transaction(&self, record: &TransactionRecord) -> Result<()> {
        self.tables
            .write()
            .transactions
            .insert(record.transaction_id, record.clone());
        Ok(())
    }

    fn find_transaction(&self, transaction_id: TransactionId) -> Result<Option<TransactionRecord>> {
        Ok(self.tables.read().transactions.get(&transaction_id).cloned())
    }

    fn query_transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .tables
            .read()
            .transactions
            .values()
            .rev()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }
}

impl LedgerStore for MemoryStore {
    fn next_account_id(&self) -> Result<AccountId> {
        let mut tables = self.tables.write();
        tables.account_seq += 1;
        Ok(AccountId::new(tables.account_seq))
    }

    fn next_transaction_id(&self) -> Result<TransactionId> {
        let mut tables = self.tables.write();
        tables.transaction_seq += 1;
        Ok(TransactionId::new(tables.transaction_seq))
    }

    fn commit(&self, account: &Account, record: &TransactionRecord) -> Result<()> {
        if record.account_id != account.account_id {
            return Err(Error::InvalidOperation(format!(
                "{} does not belong to {}",
                record.transaction_id, account.account_id
            )));
        }

        let mut tables = self.tables.write();
        tables.upsert_account(account)?;
        tables
            .transactions
            .insert(record.transaction_id, record.clone());
        Ok(())
    }
}
