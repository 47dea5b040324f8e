//! Actor-based concurrency for the ledger
//!
//! Every mutation (account opening, status and limit changes, transaction
//! creation and annulment) runs on one tokio task that owns the write path:
//! - The read-validate-mutate-write sequence for an account never interleaves
//! - Each mutation commits as one atomic store write before the caller is answered
//! - A bounded mailbox gives callers backpressure
//!
//! Reads do not go through the actor; they hit the store directly.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │          Callers (any number of tasks)                │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox               │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │   validate → mutate Account → LedgerStore::commit     │
//! │          → cache.push → queue.enqueue                 │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::account::Account;
use crate::cache::RecentTransactionCache;
use crate::config::{LedgerConfig, LimitPolicy};
use crate::metrics::Metrics;
use crate::queue::{NotificationEvent, NotificationQueue};
use crate::store::LedgerStore;
use crate::transaction::TransactionRecord;
use crate::types::{
    normalize_amount, AccountId, AccountStatus, StudentId, TransactionId, TransactionKind,
    TransactionRequest, TransactionStatus, UserId,
};
use crate::{Error, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Open an account for a student
    OpenAccount {
        student_id: StudentId,
        response: oneshot::Sender<Result<Account>>,
    },

    /// Create a credit or debit
    CreateTransaction {
        request: TransactionRequest,
        actor: UserId,
        response: oneshot::Sender<Result<TransactionRecord>>,
    },

    /// Annul a completed transaction
    VoidTransaction {
        transaction_id: TransactionId,
        justification: String,
        actor: UserId,
        response: oneshot::Sender<Result<TransactionRecord>>,
    },

    /// Change account status
    SetStatus {
        account_id: AccountId,
        status: AccountStatus,
        response: oneshot::Sender<Result<Account>>,
    },

    /// Change or clear the per-transaction cap
    SetTransactionLimit {
        account_id: AccountId,
        limit: Option<Decimal>,
        response: oneshot::Sender<Result<Account>>,
    },

    /// Stop after answering every message queued before this one
    Shutdown { response: oneshot::Sender<()> },
}

/// Actor that owns the ledger write path
pub struct LedgerActor {
    store: Arc<dyn LedgerStore>,
    cache: Arc<RecentTransactionCache>,
    queue: Arc<NotificationQueue>,
    metrics: Metrics,
    config: LedgerConfig,
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        store: Arc<dyn LedgerStore>,
        cache: Arc<RecentTransactionCache>,
        queue: Arc<NotificationQueue>,
        metrics: Metrics,
        config: LedgerConfig,
        mailbox: mpsc::Receiver<LedgerMessage>,
    ) -> Self {
        Self {
            store,
            cache,
            queue,
            metrics,
            config,
            mailbox,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let mut shutdown = None;

        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::OpenAccount {
                    student_id,
                    response,
                } => {
                    let result = self.open_account(student_id);
                    self.reply(response, result);
                }

                LedgerMessage::CreateTransaction {
                    request,
                    actor,
                    response,
                } => {
                    let result = self.create_transaction(request, actor);
                    self.reply(response, result);
                }

                LedgerMessage::VoidTransaction {
                    transaction_id,
                    justification,
                    actor,
                    response,
                } => {
                    let result = self.void_transaction(transaction_id, &justification, actor);
                    self.reply(response, result);
                }

                LedgerMessage::SetStatus {
                    account_id,
                    status,
                    response,
                } => {
                    let result = self.set_status(account_id, status);
                    self.reply(response, result);
                }

                LedgerMessage::SetTransactionLimit {
                    account_id,
                    limit,
                    response,
                } => {
                    let result = self.set_transaction_limit(account_id, limit);
                    self.reply(response, result);
                }

                LedgerMessage::Shutdown { response } => {
                    shutdown = Some(response);
                    break;
                }
            }
        }

        tracing::info!("Ledger actor stopped");

        // Release the store before acknowledging so the caller can reopen it
        drop(self);
        if let Some(response) = shutdown {
            let _ = response.send(());
        }
    }

    /// Record the outcome and answer the caller
    fn reply<T>(&self, response: oneshot::Sender<Result<T>>, result: Result<T>) {
        if let Err(ref e) = result {
            self.metrics.record_rejection(e);
            if e.is_business_rejection() {
                tracing::debug!(reason = e.label(), "Request rejected: {}", e);
            } else {
                tracing::error!(reason = e.label(), "Error handling message: {}", e);
            }
        }

        if response.send(result).is_err() {
            tracing::debug!("Caller dropped before the reply was sent");
        }
    }

    fn load_account(&self, account_id: AccountId) -> Result<Account> {
        self.store
            .find_account(account_id)?
            .ok_or_else(|| Error::NotFound(format!("{} not found", account_id)))
    }

    fn open_account(&self, student_id: StudentId) -> Result<Account> {
        if self.store.find_account_by_student(student_id)?.is_some() {
            return Err(Error::DuplicateAccount(student_id));
        }

        let account = Account::open(
            self.store.next_account_id()?,
            student_id,
            self.config.opening_balance,
            self.config.default_transaction_limit,
            Utc::now(),
        )?;
        self.store.save_account(&account)?;
        self.metrics.record_account_opened();

        tracing::info!(
            account_id = %account.account_id,
            student_id = %student_id,
            balance = %account.balance,
            "Account opened"
        );

        Ok(account)
    }

    fn check_limit(&self, account: &Account, amount: Decimal) -> Result<()> {
        let Some(limit) = account.transaction_limit else {
            return Ok(());
        };
        if amount <= limit {
            return Ok(());
        }

        match self.config.limit_policy {
            LimitPolicy::Advisory => {
                tracing::warn!(
                    account_id = %account.account_id,
                    amount = %amount,
                    limit = %limit,
                    "Transaction exceeds account limit"
                );
                Ok(())
            }
            LimitPolicy::Enforce => Err(Error::LimitExceeded { amount, limit }),
        }
    }

    fn create_transaction(
        &self,
        request: TransactionRequest,
        actor: UserId,
    ) -> Result<TransactionRecord> {
        let started = Instant::now();

        let amount = normalize_amount(request.amount)?;
        if request.description.trim().is_empty() {
            return Err(Error::InvalidOperation(
                "description is required".to_string(),
            ));
        }

        let mut account = self.load_account(request.account_id)?;
        if !account.is_active() {
            return Err(Error::InvalidOperation(format!(
                "{} is {}, transactions are not allowed",
                account.account_id, account.status
            )));
        }

        if request.kind == TransactionKind::Debit && !account.has_sufficient_balance(amount) {
            return Err(Error::InsufficientBalance {
                balance: account.balance,
                required: amount,
            });
        }

        self.check_limit(&account, amount)?;

        let now = Utc::now();
        let balance_before = account.balance;
        match request.kind {
            TransactionKind::Credit => account.credit(amount)?,
            TransactionKind::Debit => account.debit(amount)?,
        }
        let balance_after = account.balance;
        account.touch(now);

        let record = TransactionRecord {
            transaction_id: self.store.next_transaction_id()?,
            account_id: account.account_id,
            kind: request.kind,
            amount,
            category_id: request.category_id,
            description: request.description,
            reference: request.reference,
            status: TransactionStatus::Completed,
            balance_before,
            balance_after,
            created_by: actor,
            void_reason: None,
            voided_by: None,
            voided_at: None,
            created_at: now,
            updated_at: now,
        };

        self.store.commit(&account, &record)?;

        self.cache.push(record.clone());

        let event = match record.kind {
            TransactionKind::Credit => NotificationEvent::credit(
                account.account_id,
                account.student_id,
                record.transaction_id,
                amount,
                &record.description,
            ),
            TransactionKind::Debit => NotificationEvent::debit(
                account.account_id,
                account.student_id,
                record.transaction_id,
                amount,
                &record.description,
            ),
        };
        self.stage_notification(event);

        self.metrics.record_transaction(record.kind);
        self.metrics
            .record_commit_duration(started.elapsed().as_secs_f64());
        self.metrics.update_buffers(self.cache.len(), self.queue.len());

        tracing::info!(
            transaction_id = %record.transaction_id,
            account_id = %account.account_id,
            kind = %record.kind,
            amount = %amount,
            balance_before = %balance_before,
            balance_after = %balance_after,
            actor = %actor,
            "Transaction committed"
        );

        Ok(record)
    }

    fn void_transaction(
        &self,
        transaction_id: TransactionId,
        justification: &str,
        actor: UserId,
    ) -> Result<TransactionRecord> {
        let started = Instant::now();

        let reason = justification.trim();
        if reason.is_empty() {
            return Err(Error::InvalidOperation(
                "justification is required".to_string(),
            ));
        }

        let mut record = self
            .store
            .find_transaction(transaction_id)?
            .ok_or_else(|| Error::NotFound(format!("{} not found", transaction_id)))?;
        if !record.is_completed() {
            return Err(Error::InvalidOperation(format!(
                "{} is already voided",
                transaction_id
            )));
        }

        let mut account = self.load_account(record.account_id)?;

        // Reverse against the current balance
        match record.kind {
            TransactionKind::Credit => account.debit(record.amount)?,
            TransactionKind::Debit => account.credit(record.amount)?,
        }

        let now = Utc::now();
        account.touch(now);
        record.void(actor, reason, now)?;

        self.store.commit(&account, &record)?;

        self.stage_notification(NotificationEvent::void(
            account.account_id,
            account.student_id,
            record.transaction_id,
            record.amount,
            reason,
        ));

        self.metrics.record_void();
        self.metrics
            .record_commit_duration(started.elapsed().as_secs_f64());
        self.metrics.update_buffers(self.cache.len(), self.queue.len());

        tracing::warn!(
            transaction_id = %record.transaction_id,
            account_id = %account.account_id,
            kind = %record.kind,
            amount = %record.amount,
            balance = %account.balance,
            actor = %actor,
            reason,
            "Transaction voided"
        );

        Ok(record)
    }

    fn set_status(&self, account_id: AccountId, status: AccountStatus) -> Result<Account> {
        let mut account = self.load_account(account_id)?;
        let previous = account.status;

        account.transition(status)?;
        account.touch(Utc::now());
        self.store.save_account(&account)?;

        if status == AccountStatus::Closed {
            tracing::warn!(
                account_id = %account_id,
                balance = %account.balance,
                "Account closed"
            );
        } else {
            tracing::info!(
                account_id = %account_id,
                from = %previous,
                to = %status,
                "Account status changed"
            );
        }

        Ok(account)
    }

    fn set_transaction_limit(
        &self,
        account_id: AccountId,
        limit: Option<Decimal>,
    ) -> Result<Account> {
        if let Some(limit) = limit {
            if limit <= Decimal::ZERO {
                return Err(Error::InvalidAmount(format!(
                    "transaction limit must be positive, got {}",
                    limit
                )));
            }
        }

        let mut account = self.load_account(account_id)?;
        account.transaction_limit = limit;
        account.touch(Utc::now());
        self.store.save_account(&account)?;

        tracing::info!(
            account_id = %account_id,
            limit = ?limit,
            "Transaction limit updated"
        );

        Ok(account)
    }

    /// Enqueue failure never rolls back a committed mutation
    fn stage_notification(&self, event: NotificationEvent) {
        let account_id = event.account_id;
        let transaction_id = event.transaction_id;
        if let Err(e) = self.queue.enqueue(event) {
            tracing::warn!(
                account_id = %account_id,
                transaction_id = %transaction_id,
                "Failed to stage notification: {}",
                e
            );
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Open an account
    pub async fn open_account(&self, student_id: StudentId) -> Result<Account> {
        self.call(|response| LedgerMessage::OpenAccount {
            student_id,
            response,
        })
        .await
    }

    /// Create a transaction
    pub async fn create_transaction(
        &self,
        request: TransactionRequest,
        actor: UserId,
    ) -> Result<TransactionRecord> {
        self.call(|response| LedgerMessage::CreateTransaction {
            request,
            actor,
            response,
        })
        .await
    }

    /// Void a transaction
    pub async fn void_transaction(
        &self,
        transaction_id: TransactionId,
        justification: String,
        actor: UserId,
    ) -> Result<TransactionRecord> {
        self.call(|response| LedgerMessage::VoidTransaction {
            transaction_id,
            justification,
            actor,
            response,
        })
        .await
    }

    /// Change account status
    pub async fn set_status(
        &self,
        account_id: AccountId,
        status: AccountStatus,
    ) -> Result<Account> {
        self.call(|response| LedgerMessage::SetStatus {
            account_id,
            status,
            response,
        })
        .await
    }

    /// Change the per-transaction cap
    pub async fn set_transaction_limit(
        &self,
        account_id: AccountId,
        limit: Option<Decimal>,
    ) -> Result<Account> {
        self.call(|response| LedgerMessage::SetTransactionLimit {
            account_id,
            limit,
            response,
        })
        .await
    }

    /// Shutdown actor, waiting until it stops
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Shutdown { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    store: Arc<dyn LedgerStore>,
    cache: Arc<RecentTransactionCache>,
    queue: Arc<NotificationQueue>,
    metrics: Metrics,
    config: LedgerConfig,
) -> LedgerHandle {
    // Bounded channel for backpressure
    let (tx, rx) = mpsc::channel(config.mailbox_capacity.max(1));
    let actor = LedgerActor::new(store, cache, queue, metrics, config, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
