//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal with 2 fractional digits for DUNAB)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fractional digits carried by every DUNAB amount
pub const DUNAB_SCALE: u32 = 2;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw id
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Raw id value
            pub const fn value(&self) -> u64 {
                self.0
            }

            /// Big-endian key bytes (preserves ordering in RocksDB)
            pub fn to_key(&self) -> [u8; 8] {
                self.0.to_be_bytes()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $label, self.0)
            }
        }
    };
}

numeric_id!(
    /// DUNAB account identifier (assigned by the ledger)
    AccountId,
    "account"
);
numeric_id!(
    /// Transaction record identifier (monotonically assigned)
    TransactionId,
    "tx"
);
numeric_id!(
    /// Student owning an account (1:1)
    StudentId,
    "student"
);
numeric_id!(
    /// Acting user (creator of a transaction, voider, etc.)
    UserId,
    "user"
);
numeric_id!(
    /// Transaction category in the external catalog
    CategoryId,
    "category"
);

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum AccountStatus {
    /// Accepts transactions
    Active = 1,
    /// Temporarily frozen
    Suspended = 2,
    /// Soft-deleted (terminal)
    Closed = 3,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Suspended => "SUSPENDED",
            AccountStatus::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

/// Direction of a balance mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TransactionKind {
    /// Adds DUNAB to the account
    Credit = 1,
    /// Removes DUNAB from the account
    Debit = 2,
}

impl TransactionKind {
    /// Kind that undoes this one
    pub fn inverse(&self) -> Self {
        match self {
            TransactionKind::Credit => TransactionKind::Debit,
            TransactionKind::Debit => TransactionKind::Credit,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionKind::Credit => "CREDIT",
            TransactionKind::Debit => "DEBIT",
        };
        f.write_str(s)
    }
}

/// Transaction record status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TransactionStatus {
    /// Applied to the account
    Completed = 1,
    /// Reversed by an annulment
    Voided = 2,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Voided => "VOIDED",
        };
        f.write_str(s)
    }
}

/// Inbound request to create a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Target account
    pub account_id: AccountId,

    /// Credit or debit
    pub kind: TransactionKind,

    /// Amount, at least 0.01 with at most 2 fractional digits
    pub amount: Decimal,

    /// Optional category reference
    pub category_id: Option<CategoryId>,

    /// Required free-text description
    pub description: String,

    /// Optional external reference
    pub reference: Option<String>,
}

impl TransactionRequest {
    /// Credit request without category or reference
    pub fn credit(account_id: AccountId, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            account_id,
            kind: TransactionKind::Credit,
            amount,
            category_id: None,
            description: description.into(),
            reference: None,
        }
    }

    /// Debit request without category or reference
    pub fn debit(account_id: AccountId, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            account_id,
            kind: TransactionKind::Debit,
            amount,
            category_id: None,
            description: description.into(),
            reference: None,
        }
    }

    /// Attach a category
    pub fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Attach an external reference
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Validate a request amount and normalize it to 2 fractional digits.
///
/// Rejects anything below 0.01, carrying sub-cent precision, or too large
/// to be represented with two fractional digits.
pub fn normalize_amount(amount: Decimal) -> crate::Result<Decimal> {
    let minimum = Decimal::new(1, DUNAB_SCALE);
    if amount < minimum {
        return Err(crate::Error::InvalidAmount(format!(
            "amount must be at least {}, got {}",
            minimum, amount
        )));
    }

    if amount.normalize().scale() > DUNAB_SCALE {
        return Err(crate::Error::InvalidAmount(format!(
            "amount {} has more than {} fractional digits",
            amount, DUNAB_SCALE
        )));
    }

    let mut normalized = amount;
    normalized.rescale(DUNAB_SCALE);
    if normalized.scale() != DUNAB_SCALE {
        return Err(crate::Error::InvalidAmount(format!(
            "amount {} is too large to carry {} fractional digits",
            amount, DUNAB_SCALE
        )));
    }
    Ok(normalized)
}

/// Per-account aggregate view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStatistics {
    /// Account
    pub account_id: AccountId,
    /// Current balance
    pub balance: Decimal,
    /// Lifetime earned accumulator
    pub lifetime_earned: Decimal,
    /// Lifetime spent accumulator
    pub lifetime_spent: Decimal,
    /// Sum of COMPLETED credits
    pub total_credits: Decimal,
    /// Sum of COMPLETED debits
    pub total_debits: Decimal,
    /// Number of COMPLETED records
    pub completed_transactions: u64,
}

/// Calendar-month summary for one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    /// Account
    pub account_id: AccountId,
    /// Year
    pub year: i32,
    /// Month (1-12)
    pub month: u32,
    /// Sum of COMPLETED credits in the month
    pub total_credits: Decimal,
    /// Sum of COMPLETED debits in the month
    pub total_debits: Decimal,
    /// credits - debits
    pub net: Decimal,
    /// COMPLETED records in the month
    pub transaction_count: u64,
    /// Balance at query time
    pub current_balance: Decimal,
}

/// System-wide totals over active accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    /// Sum of balances of ACTIVE accounts
    pub total_balance: Decimal,
    /// Sum of lifetime earned of ACTIVE accounts
    pub total_earned: Decimal,
    /// Sum of lifetime spent of ACTIVE accounts
    pub total_spent: Decimal,
    /// Number of ACTIVE accounts
    pub active_accounts: u64,
    /// Number of accounts in any status
    pub total_accounts: u64,
}

/// Half-open UTC time window `[from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive start
    pub from: DateTime<Utc>,
    /// Exclusive end
    pub to: DateTime<Utc>,
}

impl TimeRange {
    /// Whether `at` falls inside the window
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at < self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_amount_rescales() {
        let amount = normalize_amount(Decimal::new(150, 0)).unwrap();
        assert_eq!(amount.to_string(), "150.00");

        let amount = normalize_amount(Decimal::new(1500, 3)).unwrap();
        assert_eq!(amount.to_string(), "1.50");
    }

    #[test]
    fn test_normalize_amount_rejects_small_and_fractional() {
        assert!(normalize_amount(Decimal::ZERO).is_err());
        assert!(normalize_amount(Decimal::new(-500, 2)).is_err());
        assert!(normalize_amount(Decimal::new(9, 3)).is_err());
        assert!(normalize_amount(Decimal::new(10001, 3)).is_err());
        assert!(normalize_amount(Decimal::new(1, 2)).is_ok());
    }

    #[test]
    fn test_normalize_amount_rejects_unscalable() {
        assert!(matches!(
            normalize_amount(Decimal::MAX),
            Err(crate::Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_id_key_ordering() {
        let a = TransactionId::new(9);
        let b = TransactionId::new(256);
        assert!(a.to_key() < b.to_key());
        assert_eq!(a.to_string(), "tx#9");
    }

    #[test]
    fn test_kind_inverse() {
        assert_eq!(TransactionKind::Credit.inverse(), TransactionKind::Debit);
        assert_eq!(TransactionKind::Debit.inverse(), TransactionKind::Credit);
    }
}
