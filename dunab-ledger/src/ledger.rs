//! Main ledger orchestration layer
//!
//! Ties together the store, the single-writer actor, the recent-transaction
//! cache and the notification queue into one high-level API. Mutations go
//! through the actor; reads go straight to the store (or the cache for
//! `recent_transactions`).
//!
//! # Example
//!
//! ```no_run
//! use dunab_ledger::{Config, Ledger, StudentId, TransactionRequest, UserId};
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() -> dunab_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::default()).await?;
//!
//!     let account = ledger.open_account(StudentId::new(1001)).await?;
//!     let request =
//!         TransactionRequest::credit(account.account_id, Decimal::new(15000, 2), "event reward");
//!     let record = ledger.create_transaction(request, UserId::new(1)).await?;
//!     assert_eq!(record.balance_after, Decimal::new(65000, 2));
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    account::Account,
    actor::{spawn_ledger_actor, LedgerHandle},
    cache::{CacheStats, RecentTransactionCache},
    metrics::Metrics,
    queue::{NotificationQueue, QueueStats},
    store::{LedgerStore, RocksStore, TransactionFilter},
    transaction::TransactionRecord,
    types::{
        AccountId, AccountStatistics, AccountStatus, MonthlySummary, StudentId, SystemStats,
        TimeRange, TransactionId, TransactionKind, TransactionRequest, TransactionStatus, UserId,
    },
    Config, Error, Result,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Main ledger interface
#[derive(Clone)]
pub struct Ledger {
    /// Actor handle for mutations
    handle: LedgerHandle,

    /// Direct store access (for reads)
    store: Arc<dyn LedgerStore>,

    /// Shared recent-transaction window
    cache: Arc<RecentTransactionCache>,

    /// Shared notification staging queue
    queue: Arc<NotificationQueue>,

    /// Metrics
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger backed by RocksDB at `config.data_dir`
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(RocksStore::open(&config)?);
        Self::with_store(config, store).await
    }

    /// Open ledger over any store
    pub async fn with_store(config: Config, store: Arc<dyn LedgerStore>) -> Result<Self> {
        config.validate()?;

        let cache = Arc::new(RecentTransactionCache::new(config.ledger.cache_capacity));
        let queue = Arc::new(NotificationQueue::new());
        let metrics = Metrics::new()?;

        let handle = spawn_ledger_actor(
            store.clone(),
            cache.clone(),
            queue.clone(),
            metrics.clone(),
            config.ledger.clone(),
        );

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            limit_policy = ?config.ledger.limit_policy,
            cache_capacity = config.ledger.cache_capacity,
            "Ledger started"
        );

        Ok(Self {
            handle,
            store,
            cache,
            queue,
            metrics,
            config,
        })
    }

    // Account lifecycle

    /// Open an account for a student with the configured opening balance
    pub async fn open_account(&self, student_id: StudentId) -> Result<Account> {
        self.handle.open_account(student_id).await
    }

    /// Suspend an account. Suspended accounts reject new transactions.
    pub async fn suspend_account(&self, account_id: AccountId) -> Result<Account> {
        self.set_status(account_id, AccountStatus::Suspended).await
    }

    /// Reactivate a suspended account
    pub async fn activate_account(&self, account_id: AccountId) -> Result<Account> {
        self.set_status(account_id, AccountStatus::Active).await
    }

    /// Close an account. Closing is permanent.
    pub async fn close_account(&self, account_id: AccountId) -> Result<Account> {
        self.set_status(account_id, AccountStatus::Closed).await
    }

    /// Move an account to `status`
    pub async fn set_status(
        &self,
        account_id: AccountId,
        status: AccountStatus,
    ) -> Result<Account> {
        self.handle.set_status(account_id, status).await
    }

    /// Set or clear the per-transaction cap
    pub async fn set_transaction_limit(
        &self,
        account_id: AccountId,
        limit: Option<Decimal>,
    ) -> Result<Account> {
        self.handle.set_transaction_limit(account_id, limit).await
    }

    // Transactions

    /// Create a credit or debit.
    ///
    /// Resolves only after the account and record are durably committed.
    pub async fn create_transaction(
        &self,
        request: TransactionRequest,
        actor: UserId,
    ) -> Result<TransactionRecord> {
        self.handle.create_transaction(request, actor).await
    }

    /// Annul a completed transaction by applying its inverse to the current balance
    pub async fn void_transaction(
        &self,
        transaction_id: TransactionId,
        justification: impl Into<String>,
        actor: UserId,
    ) -> Result<TransactionRecord> {
        self.handle
            .void_transaction(transaction_id, justification.into(), actor)
            .await
    }

    // Account reads

    /// Account by ID
    pub fn account(&self, account_id: AccountId) -> Result<Account> {
        self.store
            .find_account(account_id)?
            .ok_or_else(|| Error::NotFound(format!("{} not found", account_id)))
    }

    /// Account owned by a student
    pub fn account_for_student(&self, student_id: StudentId) -> Result<Account> {
        self.store
            .find_account_by_student(student_id)?
            .ok_or_else(|| Error::NotFound(format!("No account for {}", student_id)))
    }

    /// Current balance
    pub fn balance(&self, account_id: AccountId) -> Result<Decimal> {
        Ok(self.account(account_id)?.balance)
    }

    /// Accounts in `status`, ordered by ID
    pub fn accounts_by_status(&self, status: AccountStatus) -> Result<Vec<Account>> {
        Ok(self
            .store
            .list_accounts()?
            .into_iter()
            .filter(|account| account.status == status)
            .collect())
    }

    /// Top `limit` accounts by balance, highest first
    pub fn ranking(&self, limit: usize) -> Result<Vec<Account>> {
        let mut accounts = self.store.list_accounts()?;
        accounts.sort_by(|a, b| {
            b.balance
                .cmp(&a.balance)
                .then_with(|| a.account_id.cmp(&b.account_id))
        });
        accounts.truncate(limit);
        Ok(accounts)
    }

    /// Totals over ACTIVE accounts
    pub fn system_stats(&self) -> Result<SystemStats> {
        let accounts = self.store.list_accounts()?;
        let active: Vec<&Account> = accounts.iter().filter(|a| a.is_active()).collect();

        Ok(SystemStats {
            total_balance: active.iter().map(|a| a.balance).sum(),
            total_earned: active.iter().map(|a| a.lifetime_earned).sum(),
            total_spent: active.iter().map(|a| a.lifetime_spent).sum(),
            active_accounts: active.len() as u64,
            total_accounts: accounts.len() as u64,
        })
    }

    // Transaction reads

    /// Record by ID
    pub fn transaction(&self, transaction_id: TransactionId) -> Result<TransactionRecord> {
        self.store
            .find_transaction(transaction_id)?
            .ok_or_else(|| Error::NotFound(format!("{} not found", transaction_id)))
    }

    /// Full durable history of an account, newest first
    pub fn transactions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionRecord>> {
        self.account(account_id)?;
        self.store
            .query_transactions(&TransactionFilter::for_account(account_id))
    }

    /// Records matching `filter`, newest first
    pub fn query_transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>> {
        self.store.query_transactions(filter)
    }

    /// Up to `limit` cached records for an account, newest first.
    ///
    /// Cache-backed and possibly incomplete; use
    /// [`transactions_for_account`](Self::transactions_for_account) for the
    /// authoritative history.
    pub fn recent_transactions(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Vec<TransactionRecord> {
        self.cache.recent_for_account(account_id, limit)
    }

    /// Sum of COMPLETED amounts of `kind`
    pub fn total_by_kind(&self, account_id: AccountId, kind: TransactionKind) -> Result<Decimal> {
        self.store.total_by_kind(account_id, kind)
    }

    /// Number of COMPLETED records
    pub fn count_completed(&self, account_id: AccountId) -> Result<u64> {
        self.store.count_completed(account_id)
    }

    /// Balance, accumulators and COMPLETED aggregates for one account
    pub fn account_statistics(&self, account_id: AccountId) -> Result<AccountStatistics> {
        let account = self.account(account_id)?;
        let completed = self.store.query_transactions(
            &TransactionFilter::for_account(account_id).status(TransactionStatus::Completed),
        )?;

        let (total_credits, total_debits) = sum_by_kind(&completed);

        Ok(AccountStatistics {
            account_id,
            balance: account.balance,
            lifetime_earned: account.lifetime_earned,
            lifetime_spent: account.lifetime_spent,
            total_credits,
            total_debits,
            completed_transactions: completed.len() as u64,
        })
    }

    /// COMPLETED activity of one account in a UTC calendar month
    pub fn monthly_summary(
        &self,
        account_id: AccountId,
        year: i32,
        month: u32,
    ) -> Result<MonthlySummary> {
        let account = self.account(account_id)?;
        let range = month_range(year, month)?;

        let records = self.store.query_transactions(
            &TransactionFilter::for_account(account_id)
                .status(TransactionStatus::Completed)
                .created_within(range),
        )?;

        let (total_credits, total_debits) = sum_by_kind(&records);

        Ok(MonthlySummary {
            account_id,
            year,
            month,
            total_credits,
            total_debits,
            net: total_credits - total_debits,
            transaction_count: records.len() as u64,
            current_balance: account.balance,
        })
    }

    // Diagnostics

    /// Notification queue size
    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Recent cache occupancy
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Shared recent-transaction cache
    pub fn cache(&self) -> &Arc<RecentTransactionCache> {
        &self.cache
    }

    /// Shared notification queue, for dispatchers
    pub fn queue(&self) -> &Arc<NotificationQueue> {
        &self.queue
    }

    /// Metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shutdown ledger
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}

fn sum_by_kind(records: &[TransactionRecord]) -> (Decimal, Decimal) {
    records
        .iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(credits, debits), record| {
            match record.kind {
                TransactionKind::Credit => (credits + record.amount, debits),
                TransactionKind::Debit => (credits, debits + record.amount),
            }
        })
}

fn month_start(year: i32, month: u32) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(year, month, 1)?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// `[first of month, first of next month)` in UTC
fn month_range(year: i32, month: u32) -> Result<TimeRange> {
    let invalid = || Error::InvalidOperation(format!("invalid month {}-{}", year, month));

    let from = month_start(year, month).ok_or_else(invalid)?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let to = month_start(next_year, next_month).ok_or_else(invalid)?;

    Ok(TimeRange { from, to })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Datelike;

    fn dunab(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    async fn memory_ledger() -> Ledger {
        Ledger::with_store(Config::default(), Arc::new(MemoryStore::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_ledger_on_rocksdb() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.rocksdb.sync_writes = false;

        let ledger = Ledger::open(config).await.unwrap();
        let account = ledger.open_account(StudentId::new(1)).await.unwrap();
        assert_eq!(ledger.balance(account.account_id).unwrap(), dunab(50000));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_account_defaults() {
        let ledger = memory_ledger().await;
        let account = ledger.open_account(StudentId::new(42)).await.unwrap();

        assert_eq!(account.balance, dunab(50000));
        assert_eq!(account.lifetime_earned, dunab(50000));
        assert_eq!(account.lifetime_spent, Decimal::ZERO);
        assert_eq!(account.status, AccountStatus::Active);
        assert_eq!(account.transaction_limit, Some(dunab(1_000_000)));

        assert_eq!(
            ledger.account_for_student(StudentId::new(42)).unwrap().account_id,
            account.account_id
        );
        assert!(matches!(
            ledger.open_account(StudentId::new(42)).await,
            Err(Error::DuplicateAccount(_))
        ));
        assert!(matches!(
            ledger.account_for_student(StudentId::new(43)),
            Err(Error::NotFound(_))
        ));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_status_lifecycle() {
        let ledger = memory_ledger().await;
        let id = ledger.open_account(StudentId::new(1)).await.unwrap().account_id;

        ledger.suspend_account(id).await.unwrap();
        assert_eq!(ledger.accounts_by_status(AccountStatus::Suspended).unwrap().len(), 1);
        ledger.activate_account(id).await.unwrap();

        let closed = ledger.close_account(id).await.unwrap();
        assert_eq!(closed.status, AccountStatus::Closed);
        assert!(matches!(
            ledger.activate_account(id).await,
            Err(Error::InvalidOperation(_))
        ));
        assert!(ledger.accounts_by_status(AccountStatus::Active).unwrap().is_empty());

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_ranking_and_system_stats() {
        let ledger = memory_ledger().await;
        let a = ledger.open_account(StudentId::new(1)).await.unwrap().account_id;
        let b = ledger.open_account(StudentId::new(2)).await.unwrap().account_id;
        let c = ledger.open_account(StudentId::new(3)).await.unwrap().account_id;

        ledger
            .create_transaction(
                TransactionRequest::credit(b, dunab(10000), "tutoring"),
                UserId::new(1),
            )
            .await
            .unwrap();
        ledger
            .create_transaction(
                TransactionRequest::debit(c, dunab(5000), "printing"),
                UserId::new(1),
            )
            .await
            .unwrap();
        ledger.suspend_account(c).await.unwrap();

        let ranking: Vec<AccountId> = ledger
            .ranking(10)
            .unwrap()
            .iter()
            .map(|acct| acct.account_id)
            .collect();
        assert_eq!(ranking, vec![b, a, c]);
        assert_eq!(ledger.ranking(1).unwrap().len(), 1);

        let stats = ledger.system_stats().unwrap();
        assert_eq!(stats.total_balance, dunab(110000));
        assert_eq!(stats.total_earned, dunab(110000));
        assert_eq!(stats.total_spent, Decimal::ZERO);
        assert_eq!(stats.active_accounts, 2);
        assert_eq!(stats.total_accounts, 3);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_statistics_and_monthly_summary() {
        let ledger = memory_ledger().await;
        let id = ledger.open_account(StudentId::new(1)).await.unwrap().account_id;

        ledger
            .create_transaction(
                TransactionRequest::credit(id, dunab(20000), "hackathon"),
                UserId::new(1),
            )
            .await
            .unwrap();
        let debit = ledger
            .create_transaction(
                TransactionRequest::debit(id, dunab(3000), "cafeteria"),
                UserId::new(1),
            )
            .await
            .unwrap();
        ledger
            .create_transaction(
                TransactionRequest::debit(id, dunab(1000), "printing"),
                UserId::new(1),
            )
            .await
            .unwrap();
        ledger
            .void_transaction(debit.transaction_id, "wrong account", UserId::new(2))
            .await
            .unwrap();

        let stats = ledger.account_statistics(id).unwrap();
        assert_eq!(stats.balance, dunab(69000));
        assert_eq!(stats.total_credits, dunab(20000));
        assert_eq!(stats.total_debits, dunab(1000));
        assert_eq!(stats.completed_transactions, 2);
        assert_eq!(ledger.count_completed(id).unwrap(), 2);
        assert_eq!(ledger.total_by_kind(id, TransactionKind::Debit).unwrap(), dunab(1000));

        let now = Utc::now();
        let summary = ledger.monthly_summary(id, now.year(), now.month()).unwrap();
        assert_eq!(summary.total_credits, dunab(20000));
        assert_eq!(summary.total_debits, dunab(1000));
        assert_eq!(summary.net, dunab(19000));
        assert_eq!(summary.transaction_count, 2);
        assert_eq!(summary.current_balance, dunab(69000));

        let empty = ledger.monthly_summary(id, 2001, 1).unwrap();
        assert_eq!(empty.transaction_count, 0);
        assert_eq!(empty.net, Decimal::ZERO);

        assert!(matches!(
            ledger.monthly_summary(id, now.year(), 13),
            Err(Error::InvalidOperation(_))
        ));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reads_report_not_found() {
        let ledger = memory_ledger().await;
        assert!(matches!(ledger.account(AccountId::new(9)), Err(Error::NotFound(_))));
        assert!(matches!(
            ledger.transaction(TransactionId::new(9)),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            ledger.transactions_for_account(AccountId::new(9)),
            Err(Error::NotFound(_))
        ));
        assert!(ledger.recent_transactions(AccountId::new(9), 5).is_empty());

        ledger.shutdown().await.unwrap();
    }

    #[test]
    fn test_month_range_wraps_december() {
        let range = month_range(2024, 12).unwrap();
        assert_eq!(range.from, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(range.to, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert!(month_range(2024, 0).is_err());
    }
}
