//! Metrics collection for observability
//!
//! Prometheus metrics for the ledger, registered on a per-instance registry
//! so several ledgers can live in one process.
//!
//! # Metrics
//!
//! - `dunab_transactions_total` - Committed transactions, by kind
//! - `dunab_voids_total` - Committed annulments
//! - `dunab_rejections_total` - Rejected requests, by reason
//! - `dunab_accounts_opened_total` - Accounts opened
//! - `dunab_commit_duration_seconds` - Histogram of request-to-commit latencies
//! - `dunab_cache_entries` - Recent-cache occupancy
//! - `dunab_queue_depth` - Pending notifications

use crate::types::TransactionKind;
use crate::Error;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed transactions, labelled `kind`
    pub transactions_total: IntCounterVec,

    /// Committed annulments
    pub voids_total: IntCounter,

    /// Rejected requests, labelled `reason`
    pub rejections_total: IntCounterVec,

    /// Accounts opened
    pub accounts_opened: IntCounter,

    /// Commit duration histogram
    pub commit_duration: Histogram,

    /// Recent-cache occupancy
    pub cache_entries: IntGauge,

    /// Pending notifications
    pub queue_depth: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transactions_total = IntCounterVec::new(
            Opts::new("dunab_transactions_total", "Committed transactions"),
            &["kind"],
        )?;
        registry.register(Box::new(transactions_total.clone()))?;

        let voids_total = IntCounter::new("dunab_voids_total", "Committed annulments")?;
        registry.register(Box::new(voids_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("dunab_rejections_total", "Rejected ledger requests"),
            &["reason"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let accounts_opened =
            IntCounter::new("dunab_accounts_opened_total", "Accounts opened")?;
        registry.register(Box::new(accounts_opened.clone()))?;

        let commit_duration = Histogram::with_opts(
            HistogramOpts::new(
                "dunab_commit_duration_seconds",
                "Histogram of request-to-commit latencies",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.0]),
        )?;
        registry.register(Box::new(commit_duration.clone()))?;

        let cache_entries = IntGauge::new("dunab_cache_entries", "Recent-cache occupancy")?;
        registry.register(Box::new(cache_entries.clone()))?;

        let queue_depth = IntGauge::new("dunab_queue_depth", "Pending notifications")?;
        registry.register(Box::new(queue_depth.clone()))?;

        Ok(Self {
            transactions_total,
            voids_total,
            rejections_total,
            accounts_opened,
            commit_duration,
            cache_entries,
            queue_depth,
            registry,
        })
    }

    /// Record a committed transaction
    pub fn record_transaction(&self, kind: TransactionKind) {
        let label = match kind {
            TransactionKind::Credit => "credit",
            TransactionKind::Debit => "debit",
        };
        self.transactions_total.with_label_values(&[label]).inc();
    }

    /// Record a committed annulment
    pub fn record_void(&self) {
        self.voids_total.inc();
    }

    /// Record a rejected request
    pub fn record_rejection(&self, error: &Error) {
        self.rejections_total
            .with_label_values(&[error.label()])
            .inc();
    }

    /// Record an opened account
    pub fn record_account_opened(&self) {
        self.accounts_opened.inc();
    }

    /// Record commit duration
    pub fn record_commit_duration(&self, duration_seconds: f64) {
        self.commit_duration.observe(duration_seconds);
    }

    /// Update cache and queue gauges
    pub fn update_buffers(&self, cache_entries: usize, queue_depth: usize) {
        self.cache_entries.set(cache_entries as i64);
        self.queue_depth.set(queue_depth as i64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
