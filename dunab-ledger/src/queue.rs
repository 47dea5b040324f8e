//! Notification staging queue
//!
//! Unbounded FIFO shared by every account. It decouples "a balance changed"
//! from "the student was told". Delivery is best-effort: there is no ack,
//! retry or dead-letter, and a consumer that dequeues then fails loses the
//! event. Contents are dropped on restart.

use crate::types::{AccountId, StudentId, TransactionId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// What happened to the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// DUNAB received
    Credit,
    /// DUNAB spent
    Debit,
    /// A prior transaction was annulled
    Void,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationKind::Credit => "CREDIT",
            NotificationKind::Debit => "DEBIT",
            NotificationKind::Void => "VOID",
        };
        f.write_str(s)
    }
}

/// "Notify account X about event Y"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Affected account
    pub account_id: AccountId,

    /// Student to notify
    pub student_id: StudentId,

    /// Event kind
    pub kind: NotificationKind,

    /// Amount involved
    pub amount: Decimal,

    /// Transaction that triggered the event
    pub transaction_id: TransactionId,

    /// Human-readable message
    pub message: String,

    /// Staged timestamp
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    /// "You received ..." message for a credit
    pub fn credit(
        account_id: AccountId,
        student_id: StudentId,
        transaction_id: TransactionId,
        amount: Decimal,
        description: &str,
    ) -> Self {
        Self {
            account_id,
            student_id,
            kind: NotificationKind::Credit,
            amount,
            transaction_id,
            message: format!("You received {} DUNAB for {}", amount, description),
            created_at: Utc::now(),
        }
    }

    /// "... were debited" message for a debit
    pub fn debit(
        account_id: AccountId,
        student_id: StudentId,
        transaction_id: TransactionId,
        amount: Decimal,
        description: &str,
    ) -> Self {
        Self {
            account_id,
            student_id,
            kind: NotificationKind::Debit,
            amount,
            transaction_id,
            message: format!("{} DUNAB were debited for {}", amount, description),
            created_at: Utc::now(),
        }
    }

    /// Annulment message
    pub fn void(
        account_id: AccountId,
        student_id: StudentId,
        transaction_id: TransactionId,
        amount: Decimal,
        reason: &str,
    ) -> Self {
        Self {
            account_id,
            student_id,
            kind: NotificationKind::Void,
            amount,
            transaction_id,
            message: format!(
                "Transaction #{} for {} DUNAB was voided: {}",
                transaction_id.value(),
                amount,
                reason
            ),
            created_at: Utc::now(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.message.trim().is_empty() {
            return Err(Error::InvalidNotification(format!(
                "empty message for {}",
                self.account_id
            )));
        }
        Ok(())
    }
}

/// Queue diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Events waiting
    pub size: usize,
    /// Nothing waiting
    pub is_empty: bool,
}

/// Shared FIFO of pending notifications
#[derive(Debug, Default)]
pub struct NotificationQueue {
    events: Mutex<VecDeque<NotificationEvent>>,
}

impl NotificationQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail. Fails only on an invalid event.
    pub fn enqueue(&self, event: NotificationEvent) -> Result<()> {
        event.validate()?;

        tracing::debug!(
            account_id = %event.account_id,
            student_id = %event.student_id,
            kind = %event.kind,
            "Notification staged"
        );
        self.events.lock().push_back(event);
        Ok(())
    }

    /// Pop the head, `None` when empty. Never blocks waiting for events.
    pub fn dequeue(&self) -> Option<NotificationEvent> {
        let event = self.events.lock().pop_front();
        if let Some(ref event) = event {
            tracing::debug!(
                account_id = %event.account_id,
                transaction_id = %event.transaction_id,
                "Notification dequeued"
            );
        }
        event
    }

    /// Pop up to `max` events from the head, in FIFO order
    pub fn dequeue_batch(&self, max: usize) -> Vec<NotificationEvent> {
        let mut events = self.events.lock();
        let count = max.min(events.len());
        events.drain(..count).collect()
    }

    /// Head without removing it
    pub fn peek(&self) -> Option<NotificationEvent> {
        self.events.lock().front().cloned()
    }

    /// Events waiting
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Nothing waiting
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Drop every pending event, returning how many were removed
    pub fn clear(&self) -> usize {
        let mut events = self.events.lock();
        let removed = events.len();
        events.clear();
        tracing::info!(removed, "Notification queue cleared");
        removed
    }

    /// Pending events for one account, left in place
    pub fn for_account(&self, account_id: AccountId) -> Vec<NotificationEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.account_id == account_id)
            .cloned()
            .collect()
    }

    /// Remove every pending event for one account, returning the count
    pub fn remove_for_account(&self, account_id: AccountId) -> usize {
        let mut events = self.events.lock();
        let before = events.len();
        events.retain(|event| event.account_id != account_id);
        let removed = before - events.len();
        if removed > 0 {
            tracing::info!(account_id = %account_id, removed, "Pending notifications removed");
        }
        removed
    }

    /// Diagnostics snapshot
    pub fn stats(&self) -> QueueStats {
        let events = self.events.lock();
        QueueStats {
            size: events.len(),
            is_empty: events.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(account: u64, tx: u64) -> NotificationEvent {
        NotificationEvent::credit(
            AccountId::new(account),
            StudentId::new(account * 10),
            TransactionId::new(tx),
            Decimal::new(15000, 2),
            "event reward",
        )
    }

    #[test]
    fn test_fifo_order() {
        let queue = NotificationQueue::new();
        queue.enqueue(event(1, 1)).unwrap();
        queue.enqueue(event(2, 2)).unwrap();
        queue.enqueue(event(1, 3)).unwrap();

        let first = queue.dequeue().unwrap();
        assert_eq!(first.transaction_id, TransactionId::new(1));
        assert_eq!(queue.stats(), QueueStats { size: 2, is_empty: false });

        assert_eq!(queue.dequeue().unwrap().transaction_id, TransactionId::new(2));
        assert_eq!(queue.dequeue().unwrap().transaction_id, TransactionId::new(3));
        assert!(queue.dequeue().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_rejects_blank_message() {
        let queue = NotificationQueue::new();
        let mut bad = event(1, 1);
        bad.message = "   ".to_string();

        assert!(matches!(queue.enqueue(bad), Err(Error::InvalidNotification(_))));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_messages() {
        let credit = event(1, 1);
        assert_eq!(credit.message, "You received 150.00 DUNAB for event reward");

        let debit = NotificationEvent::debit(
            AccountId::new(1),
            StudentId::new(1),
            TransactionId::new(2),
            Decimal::new(2500, 2),
            "cafeteria",
        );
        assert_eq!(debit.message, "25.00 DUNAB were debited for cafeteria");

        let void = NotificationEvent::void(
            AccountId::new(1),
            StudentId::new(1),
            TransactionId::new(3),
            Decimal::new(2500, 2),
            "duplicate",
        );
        assert_eq!(void.message, "Transaction #3 for 25.00 DUNAB was voided: duplicate");
    }

    #[test]
    fn test_per_account_views() {
        let queue = NotificationQueue::new();
        queue.enqueue(event(1, 1)).unwrap();
        queue.enqueue(event(2, 2)).unwrap();
        queue.enqueue(event(1, 3)).unwrap();

        assert_eq!(queue.for_account(AccountId::new(1)).len(), 2);
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.remove_for_account(AccountId::new(1)), 2);
        assert_eq!(queue.peek().unwrap().account_id, AccountId::new(2));
        assert_eq!(queue.remove_for_account(AccountId::new(9)), 0);
    }

    #[test]
    fn test_dequeue_batch_and_clear() {
        let queue = NotificationQueue::new();
        for tx in 1..=5 {
            queue.enqueue(event(1, tx)).unwrap();
        }

        let batch = queue.dequeue_batch(3);
        let ids: Vec<u64> = batch.iter().map(|e| e.transaction_id.value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(queue.dequeue_batch(10).len(), 2);

        queue.enqueue(event(1, 6)).unwrap();
        assert_eq!(queue.clear(), 1);
        assert!(queue.stats().is_empty);
    }
}
