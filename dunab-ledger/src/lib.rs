//! DUNAB Ledger Core
//!
//! Account ledger and transaction engine for the campus DUNAB reward currency.
//!
//! # Architecture
//!
//! - **Single Writer**: every balance mutation runs on one actor task, so the
//!   read-validate-mutate-write sequence never interleaves for an account
//! - **Atomic commit**: account row and transaction record land in one
//!   RocksDB write batch
//! - **Recent cache**: bounded, process-wide index of the last N records
//! - **Notification queue**: FIFO staging buffer drained by a dispatcher task
//!
//! # Invariants
//!
//! - Non-negative balance: `balance >= 0` for every account at all times
//! - Snapshot consistency: `balance_after = balance_before ± amount`, fixed at creation
//! - Void once: a record moves COMPLETED -> VOIDED at most once
//! - No partial writes: a rejected request leaves durable state untouched

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod types;
pub mod account;
pub mod transaction;
pub mod store;
pub mod cache;
pub mod queue;
pub mod actor;
pub mod ledger;
pub mod notify;
pub mod error;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    AccountId, AccountStatus, CategoryId, StudentId, TransactionId, TransactionKind,
    TransactionRequest, TransactionStatus, UserId,
};
pub use account::Account;
pub use transaction::TransactionRecord;
pub use cache::{CacheStats, RecentTransactionCache};
pub use queue::{NotificationEvent, NotificationKind, NotificationQueue, QueueStats};
pub use store::{
    AccountDirectory, LedgerStore, MemoryStore, RocksStore, TransactionFilter, TransactionLog,
};
pub use notify::{DispatcherHandle, LogSink, NotificationDispatcher, NotificationSink};
pub use ledger::Ledger;
pub use config::{Config, LimitPolicy};
