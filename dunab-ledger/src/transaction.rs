//! Transaction log records
//!
//! Core fields are written once at creation. Only the status and the
//! annulment fields (`void_reason`, `voided_by`, `voided_at`) change later.

use crate::types::{
    AccountId, CategoryId, TransactionId, TransactionKind, TransactionStatus, UserId,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One balance mutation in an account's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction ID (monotonic)
    pub transaction_id: TransactionId,

    /// Account this record belongs to
    pub account_id: AccountId,

    /// Credit or debit
    pub kind: TransactionKind,

    /// Positive amount, 2 fractional digits
    pub amount: Decimal,

    /// Optional category reference
    pub category_id: Option<CategoryId>,

    /// Description
    pub description: String,

    /// Optional external reference
    pub reference: Option<String>,

    /// Current status
    pub status: TransactionStatus,

    /// Account balance right before this mutation
    pub balance_before: Decimal,

    /// Account balance right after this mutation
    pub balance_after: Decimal,

    /// User who created the record
    pub created_by: UserId,

    /// Annulment justification
    pub void_reason: Option<String>,

    /// User who voided the record
    pub voided_by: Option<UserId>,

    /// Annulment timestamp
    pub voided_at: Option<DateTime<Utc>>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Void this record. A record can be voided exactly once.
    pub fn void(
        &mut self,
        actor: UserId,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.status == TransactionStatus::Voided {
            return Err(Error::InvalidOperation(format!(
                "{} is already voided",
                self.transaction_id
            )));
        }

        self.status = TransactionStatus::Voided;
        self.void_reason = Some(reason.into());
        self.voided_by = Some(actor);
        self.voided_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Credit record
    pub fn is_credit(&self) -> bool {
        self.kind == TransactionKind::Credit
    }

    /// Debit record
    pub fn is_debit(&self) -> bool {
        self.kind == TransactionKind::Debit
    }

    /// Still applied to the account
    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    /// Check `balance_after = balance_before ± amount`
    pub fn snapshots_consistent(&self) -> bool {
        match self.kind {
            TransactionKind::Credit => self.balance_after - self.balance_before == self.amount,
            TransactionKind::Debit => self.balance_before - self.balance_after == self.amount,
        }
    }
}
