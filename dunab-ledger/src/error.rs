//! Error types for the ledger

use crate::types::StudentId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Referenced account or transaction does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Non-positive or malformed amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Debit (or credit reversal) larger than the current balance
    #[error("Insufficient balance: balance {balance}, required {required}")]
    InsufficientBalance {
        /// Balance at the time of the check
        balance: Decimal,
        /// Amount the operation needed
        required: Decimal,
    },

    /// Account not active, transaction already voided, etc.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Student already owns an account
    #[error("Account already exists for student {0}")]
    DuplicateAccount(StudentId),

    /// Amount above the account's per-transaction cap (enforced policy only)
    #[error("Transaction limit exceeded: amount {amount}, limit {limit}")]
    LimitExceeded {
        /// Requested amount
        amount: Decimal,
        /// Account cap
        limit: Decimal,
    },

    /// Notification event rejected by the staging queue
    #[error("Invalid notification: {0}")]
    InvalidNotification(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for rejections caused by the request itself (bad input or a
    /// business rule), as opposed to infrastructure failures.
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::InvalidAmount(_)
                | Error::InsufficientBalance { .. }
                | Error::InvalidOperation(_)
                | Error::DuplicateAccount(_)
                | Error::LimitExceeded { .. }
        )
    }

    /// Short label used for the rejection metric
    pub fn label(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::InvalidAmount(_) => "invalid_amount",
            Error::InsufficientBalance { .. } => "insufficient_balance",
            Error::InvalidOperation(_) => "invalid_operation",
            Error::DuplicateAccount(_) => "duplicate_account",
            Error::LimitExceeded { .. } => "limit_exceeded",
            Error::InvalidNotification(_) => "invalid_notification",
            Error::Storage(_) => "storage",
            Error::Serialization(_) => "serialization",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Metrics(_) => "metrics",
            Error::Io(_) => "io",
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Metrics(err.to_string())
    }
}
