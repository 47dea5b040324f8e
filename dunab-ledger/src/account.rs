//! DUNAB account aggregate
//!
//! `credit` and `debit` are the only balance mutators. Every higher-level
//! flow (transaction creation, annulment) routes through them so the
//! non-negative balance invariant is enforced in one place.

use crate::types::{AccountId, AccountStatus, StudentId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balance-holding record, exactly one per student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Account ID
    pub account_id: AccountId,

    /// Owning student (unique)
    pub student_id: StudentId,

    /// Current balance, never negative
    pub balance: Decimal,

    /// Sum of everything ever credited (opening balance included)
    pub lifetime_earned: Decimal,

    /// Sum of everything ever debited
    pub lifetime_spent: Decimal,

    /// Current status
    pub status: AccountStatus,

    /// Optional per-transaction cap
    pub transaction_limit: Option<Decimal>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Open a new active account with the given opening balance.
    ///
    /// The opening balance counts toward `lifetime_earned`.
    pub fn open(
        account_id: AccountId,
        student_id: StudentId,
        opening_balance: Decimal,
        transaction_limit: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if opening_balance < Decimal::ZERO {
            return Err(Error::InvalidAmount(format!(
                "opening balance cannot be negative, got {}",
                opening_balance
            )));
        }

        Ok(Self {
            account_id,
            student_id,
            balance: opening_balance,
            lifetime_earned: opening_balance,
            lifetime_spent: Decimal::ZERO,
            status: AccountStatus::Active,
            transaction_limit,
            created_at: now,
            updated_at: now,
        })
    }

    /// Add `amount` to the balance and to `lifetime_earned`
    pub fn credit(&mut self, amount: Decimal) -> Result<()> {
        Self::check_positive(amount)?;

        let balance = self.balance.checked_add(amount);
        let earned = self.lifetime_earned.checked_add(amount);
        let (Some(balance), Some(earned)) = (balance, earned) else {
            return Err(Self::overflow(amount));
        };

        self.balance = balance;
        self.lifetime_earned = earned;
        Ok(())
    }

    /// Remove `amount` from the balance and add it to `lifetime_spent`.
    ///
    /// Fails without touching any field when the balance is too low.
    pub fn debit(&mut self, amount: Decimal) -> Result<()> {
        Self::check_positive(amount)?;

        if !self.has_sufficient_balance(amount) {
            return Err(Error::InsufficientBalance {
                balance: self.balance,
                required: amount,
            });
        }

        let balance = self.balance.checked_sub(amount);
        let spent = self.lifetime_spent.checked_add(amount);
        let (Some(balance), Some(spent)) = (balance, spent) else {
            return Err(Self::overflow(amount));
        };

        self.balance = balance;
        self.lifetime_spent = spent;
        Ok(())
    }

    /// `balance >= amount`
    pub fn has_sufficient_balance(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    /// `status == ACTIVE`
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Move to a new status. CLOSED is terminal.
    pub fn transition(&mut self, status: AccountStatus) -> Result<()> {
        if self.status == AccountStatus::Closed && status != AccountStatus::Closed {
            return Err(Error::InvalidOperation(format!(
                "{} is closed and cannot become {}",
                self.account_id, status
            )));
        }

        self.status = status;
        Ok(())
    }

    /// Bump `updated_at`
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn check_positive(amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(format!(
                "amount must be greater than zero, got {}",
                amount
            )));
        }
        Ok(())
    }

    fn overflow(amount: Decimal) -> Error {
        Error::InvalidAmount(format!("amount {} overflows the account totals", amount))
    }
}
