//! Notification dispatch
//!
//! A background task that drains the [`NotificationQueue`] on a fixed
//! interval and hands each event to a [`NotificationSink`]. Delivery is
//! best-effort: a sink failure is logged and the event is dropped.

use crate::config::NotificationConfig;
use crate::queue::{NotificationEvent, NotificationQueue};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Delivery collaborator (push, mail, websocket, ...)
pub trait NotificationSink: Send + Sync {
    /// Deliver one event
    fn deliver(&self, event: &NotificationEvent) -> Result<()>;
}

/// Sink that emits each event as a structured log line
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, event: &NotificationEvent) -> Result<()> {
        let payload = serde_json::to_string(event)
            .map_err(|e| Error::InvalidNotification(e.to_string()))?;

        tracing::info!(
            account_id = %event.account_id,
            student_id = %event.student_id,
            transaction_id = %event.transaction_id,
            kind = %event.kind,
            amount = %event.amount,
            payload = %payload,
            "{}",
            event.message
        );
        Ok(())
    }
}

/// Periodic queue drainer
pub struct NotificationDispatcher {
    queue: Arc<NotificationQueue>,
    sink: Arc<dyn NotificationSink>,
    poll_interval: Duration,
    max_batch: usize,
}

impl NotificationDispatcher {
    /// Create a dispatcher over `queue`
    pub fn new(
        queue: Arc<NotificationQueue>,
        sink: Arc<dyn NotificationSink>,
        config: &NotificationConfig,
    ) -> Self {
        Self {
            queue,
            sink,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            max_batch: config.max_batch.max(1),
        }
    }

    /// Deliver up to `max_batch` events, returning how many the sink accepted
    pub fn drain_once(&self) -> usize {
        let batch = self.queue.dequeue_batch(self.max_batch);
        let mut delivered = 0;

        for event in &batch {
            match self.sink.deliver(event) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::error!(
                    account_id = %event.account_id,
                    transaction_id = %event.transaction_id,
                    "Notification delivery failed, event dropped: {}",
                    e
                ),
            }
        }

        if !batch.is_empty() {
            tracing::debug!(
                dequeued = batch.len(),
                delivered,
                remaining = self.queue.len(),
                "Notification batch dispatched"
            );
        }
        delivered
    }

    /// Run on a tokio task until the returned handle is shut down
    pub fn spawn(self) -> DispatcherHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut delivered = 0usize;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        delivered += self.drain_once();
                    }
                    _ = &mut shutdown_rx => {
                        // Final drain so staged events are not left behind
                        while !self.queue.is_empty() {
                            delivered += self.drain_once();
                        }
                        break;
                    }
                }
            }

            tracing::info!(delivered, "Notification dispatcher stopped");
            delivered
        });

        DispatcherHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Running dispatcher
pub struct DispatcherHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<usize>,
}

impl DispatcherHandle {
    /// Stop the dispatcher, returning the total number of delivered events
    pub async fn shutdown(self) -> Result<usize> {
        let _ = self.shutdown.send(());
        self.task
            .await
            .map_err(|e| Error::Concurrency(format!("Dispatcher task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, StudentId, TransactionId};
    use parking_lot::Mutex;
    use rust_decimal::Decimal;

    #[derive(Default)]
    struct CollectingSink {
        delivered: Mutex<Vec<NotificationEvent>>,
    }

    impl NotificationSink for CollectingSink {
        fn deliver(&self, event: &NotificationEvent) -> Result<()> {
            self.delivered.lock().push(event.clone());
            Ok(())
        }
    }

    /// Rejects events for odd transaction IDs
    struct FlakySink;

    impl NotificationSink for FlakySink {
        fn deliver(&self, event: &NotificationEvent) -> Result<()> {
            if event.transaction_id.value() % 2 == 1 {
                return Err(Error::InvalidNotification("push gateway down".to_string()));
            }
            Ok(())
        }
    }

    fn fill(queue: &NotificationQueue, count: u64) {
        for tx in 1..=count {
            queue
                .enqueue(NotificationEvent::debit(
                    AccountId::new(1),
                    StudentId::new(10),
                    TransactionId::new(tx),
                    Decimal::new(500, 2),
                    "printing",
                ))
                .unwrap();
        }
    }

    fn config(max_batch: usize) -> NotificationConfig {
        NotificationConfig {
            enabled: true,
            poll_interval_ms: 10,
            max_batch,
        }
    }

    #[test]
    fn test_drain_once_respects_batch_and_order() {
        let queue = Arc::new(NotificationQueue::new());
        let sink = Arc::new(CollectingSink::default());
        fill(&queue, 5);

        let dispatcher = NotificationDispatcher::new(queue.clone(), sink.clone(), &config(3));
        assert_eq!(dispatcher.drain_once(), 3);
        assert_eq!(queue.len(), 2);

        let ids: Vec<u64> = sink
            .delivered
            .lock()
            .iter()
            .map(|e| e.transaction_id.value())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_sink_failure_drops_event() {
        let queue = Arc::new(NotificationQueue::new());
        fill(&queue, 4);

        let dispatcher =
            NotificationDispatcher::new(queue.clone(), Arc::new(FlakySink), &config(10));
        assert_eq!(dispatcher.drain_once(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_log_sink_accepts_events() {
        let event = NotificationEvent::credit(
            AccountId::new(1),
            StudentId::new(10),
            TransactionId::new(1),
            Decimal::new(15000, 2),
            "event reward",
        );
        assert!(LogSink.deliver(&event).is_ok());
    }

    #[tokio::test]
    async fn test_spawned_dispatcher_drains_queue() {
        let queue = Arc::new(NotificationQueue::new());
        let sink = Arc::new(CollectingSink::default());

        let handle = NotificationDispatcher::new(queue.clone(), sink.clone(), &config(2)).spawn();
        fill(&queue, 5);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let delivered = handle.shutdown().await.unwrap();
        assert_eq!(delivered, 5);
        assert!(queue.is_empty());
        assert_eq!(sink.delivered.lock().len(), 5);
    }
}
