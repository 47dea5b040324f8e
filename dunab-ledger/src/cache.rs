//! Recent-transaction cache
//!
//! Bounded, insertion-ordered window over the last `capacity` records across
//! *all* accounts. A burst on other accounts can push an account's own history
//! out; callers fall back to the store on a miss, which stays authoritative.
//!
//! Entries are snapshots taken at push time and are never updated in place,
//! so a record voided later still reads as COMPLETED here until evicted.

use crate::transaction::TransactionRecord;
use crate::types::AccountId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default shared capacity
pub const DEFAULT_CAPACITY: usize = 100;

/// Shared recent-transaction window
#[derive(Debug)]
pub struct RecentTransactionCache {
    capacity: usize,
    entries: RwLock<VecDeque<TransactionRecord>>,
}

/// Cache diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries currently held
    pub size: usize,
    /// Maximum entries
    pub capacity: usize,
    /// No entries held
    pub is_empty: bool,
}

impl Default for RecentTransactionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RecentTransactionCache {
    /// Create an empty cache holding at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(VecDeque::new()),
        }
    }

    /// Append a record, evicting the globally oldest one when full
    pub fn push(&self, record: TransactionRecord) {
        if self.capacity == 0 {
            return;
        }

        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            if let Some(evicted) = entries.pop_front() {
                tracing::debug!(
                    transaction_id = %evicted.transaction_id,
                    "Recent cache full, evicted oldest record"
                );
            }
        }

        tracing::debug!(
            transaction_id = %record.transaction_id,
            account_id = %record.account_id,
            amount = %record.amount,
            "Record pushed to recent cache"
        );
        entries.push_back(record);
    }

    /// Up to `limit` records for `account_id`, most recent first
    pub fn recent_for_account(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Vec<TransactionRecord> {
        if limit == 0 {
            return Vec::new();
        }

        self.entries
            .read()
            .iter()
            .rev()
            .filter(|record| record.account_id == account_id)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Up to `limit` records across all accounts, most recent first
    pub fn recent(&self, limit: usize) -> Vec<TransactionRecord> {
        self.entries.read().iter().rev().take(limit).cloned().collect()
    }

    /// Every cached record, most recent first
    pub fn all(&self) -> Vec<TransactionRecord> {
        self.entries.read().iter().rev().cloned().collect()
    }

    /// Most recent record
    pub fn peek(&self) -> Option<TransactionRecord> {
        self.entries.read().back().cloned()
    }

    /// Entries currently held
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// No entries held
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Maximum entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry, returning how many were removed
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write();
        let removed = entries.len();
        entries.clear();
        tracing::info!(removed, "Recent cache cleared");
        removed
    }

    /// Diagnostics snapshot
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read();
        CacheStats {
            size: entries.len(),
            capacity: self.capacity,
            is_empty: entries.is_empty(),
        }
    }
}
