//! Durable storage interfaces
//!
//! The ledger consumes these traits; it never talks to a database directly.
//!
//! - [`AccountDirectory`] - account lookup and upsert
//! - [`TransactionLog`] - record lookup and filtered queries
//! - [`LedgerStore`] - both, plus the atomic account+record commit and id
//!   sequences the write path needs
//!
//! Implementations: [`RocksStore`] (system of record) and [`MemoryStore`]
//! (tests and development).

pub mod memory;
pub mod rocks;

pub use memory::MemoryStore;
pub use rocks::RocksStore;

use crate::account::Account;
use crate::transaction::TransactionRecord;
use crate::types::{
    AccountId, CategoryId, StudentId, TimeRange, TransactionId, TransactionKind,
    TransactionStatus,
};
use crate::Result;
use rust_decimal::Decimal;

/// Account lookup and persistence
pub trait AccountDirectory: Send + Sync {
    /// Account by ID
    fn find_account(&self, account_id: AccountId) -> Result<Option<Account>>;

    /// Account owned by a student
    fn find_account_by_student(&self, student_id: StudentId) -> Result<Option<Account>>;

    /// Atomic upsert of an account row (and its student index)
    fn save_account(&self, account: &Account) -> Result<()>;

    /// Every account, ordered by ID
    fn list_accounts(&self) -> Result<Vec<Account>>;
}

/// Transaction record persistence and queries
pub trait TransactionLog: Send + Sync {
    /// Atomic upsert of a single record
    fn save_transaction(&self, record: &TransactionRecord) -> Result<()>;

    /// Record by ID
    fn find_transaction(&self, transaction_id: TransactionId) -> Result<Option<TransactionRecord>>;

    /// Records matching `filter`, newest first
    fn query_transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>>;
}

/// Store backing the ledger write path
pub trait LedgerStore: AccountDirectory + TransactionLog {
    /// Reserve the next account ID
    fn next_account_id(&self) -> Result<AccountId>;

    /// Reserve the next transaction ID (strictly increasing)
    fn next_transaction_id(&self) -> Result<TransactionId>;

    /// Persist an account and a record as one unit: both land or neither does
    fn commit(&self, account: &Account, record: &TransactionRecord) -> Result<()>;

    /// Sum of COMPLETED amounts of `kind` for an account
    fn total_by_kind(&self, account_id: AccountId, kind: TransactionKind) -> Result<Decimal> {
        let filter = TransactionFilter::for_account(account_id)
            .kind(kind)
            .status(TransactionStatus::Completed);

        Ok(self
            .query_transactions(&filter)?
            .iter()
            .map(|record| record.amount)
            .sum())
    }

    /// Number of COMPLETED records for an account
    fn count_completed(&self, account_id: AccountId) -> Result<u64> {
        let filter =
            TransactionFilter::for_account(account_id).status(TransactionStatus::Completed);
        Ok(self.query_transactions(&filter)?.len() as u64)
    }
}

/// Record query filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    /// Owning account
    pub account_id: Option<AccountId>,
    /// Kind
    pub kind: Option<TransactionKind>,
    /// Status
    pub status: Option<TransactionStatus>,
    /// Category
    pub category_id: Option<CategoryId>,
    /// Creation time window
    pub created: Option<TimeRange>,
}

impl TransactionFilter {
    /// Match every record
    pub fn all() -> Self {
        Self::default()
    }

    /// Match one account's records
    pub fn for_account(account_id: AccountId) -> Self {
        Self {
            account_id: Some(account_id),
            ..Self::default()
        }
    }

    /// Restrict by kind
    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Restrict by status
    pub fn status(mut self, status: TransactionStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restrict by category
    pub fn category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Restrict by creation window
    pub fn created_within(mut self, range: TimeRange) -> Self {
        self.created = Some(range);
        self
    }

    /// Whether `record` passes every set criterion
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        self.account_id.map_or(true, |id| record.account_id == id)
            && self.kind.map_or(true, |kind| record.kind == kind)
            && self.status.map_or(true, |status| record.status == status)
            && self
                .category_id
                .map_or(true, |category| record.category_id == Some(category))
            && self
                .created
                .map_or(true, |range| range.contains(record.created_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;
    use chrono::{Duration, Utc};

    fn record() -> TransactionRecord {
        let now = Utc::now();
        TransactionRecord {
            transaction_id: TransactionId::new(1),
            account_id: AccountId::new(3),
            kind: TransactionKind::Debit,
            amount: Decimal::new(1000, 2),
            category_id: Some(CategoryId::new(4)),
            description: "printing".to_string(),
            reference: None,
            status: TransactionStatus::Completed,
            balance_before: Decimal::new(5000, 2),
            balance_after: Decimal::new(4000, 2),
            created_by: UserId::new(1),
            void_reason: None,
            voided_by: None,
            voided_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_filter_matches() {
        let rec = record();
        assert!(TransactionFilter::all().matches(&rec));
        assert!(TransactionFilter::for_account(AccountId::new(3))
            .kind(TransactionKind::Debit)
            .category(CategoryId::new(4))
            .matches(&rec));
        assert!(!TransactionFilter::for_account(AccountId::new(2)).matches(&rec));
        assert!(!TransactionFilter::all().kind(TransactionKind::Credit).matches(&rec));
        assert!(!TransactionFilter::all()
            .status(TransactionStatus::Voided)
            .matches(&rec));
        assert!(!TransactionFilter::all().category(CategoryId::new(5)).matches(&rec));
    }

    #[test]
    fn test_filter_time_window_is_half_open() {
        let rec = record();
        let inside = TimeRange {
            from: rec.created_at,
            to: rec.created_at + Duration::seconds(1),
        };
        let ending_at = TimeRange {
            from: rec.created_at - Duration::seconds(1),
            to: rec.created_at,
        };
        assert!(TransactionFilter::all().created_within(inside).matches(&rec));
        assert!(!TransactionFilter::all().created_within(ending_at).matches(&rec));
    }
}
