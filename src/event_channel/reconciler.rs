use chrono::Utc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::outbox::{OutboxClient, OutboxError};
use super::publisher::EventPublisher;

/// Counts from one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub attempted: usize,
    pub published: usize,
    pub failed: usize,
}

/// Re-publishes outbox entries that never reached the broker.
#[derive(Clone)]
pub struct OutboxReconciler {
    outbox: OutboxClient,
    publisher: EventPublisher,
    max_attempts: u32,
    /// A pending entry younger than this is left to the task that recorded it.
    pending_grace: Duration,
}

impl OutboxReconciler {
    pub fn new(outbox: OutboxClient, publisher: EventPublisher, max_attempts: u32, pending_grace: Duration) -> Self {
        Self {
            outbox,
            publisher,
            max_attempts,
            pending_grace,
        }
    }

    /// One pass over the outbox.
    pub async fn reconcile_once(&self) -> Result<ReconcileReport, OutboxError> {
        let grace = chrono::Duration::from_std(self.pending_grace).unwrap_or(chrono::Duration::zero());
        let due = self.outbox.due(self.max_attempts, Utc::now() - grace).await?;

        let mut report = ReconcileReport::default();
        for entry in due {
            report.attempted += 1;
            match self.publisher.publish_entry(&entry).await {
                Ok(()) => report.published += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(entry_id = %entry.id, attempts = entry.attempts + 1, error = %e, "Redelivery failed");
                }
            }
        }
        if report.attempted > 0 {
            info!(?report, "Outbox reconciled");
        }
        Ok(report)
    }

    /// Runs `reconcile_once` every `interval` until `shutdown` flips to true.
    /// Published entries are pruned after each pass.
    pub fn spawn(self, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.reconcile_once().await {
                            warn!(error = %e, "Outbox reconciliation failed");
                            continue;
                        }
                        if let Err(e) = self.outbox.prune_published().await {
                            warn!(error = %e, "Outbox prune failed");
                        }
                    }
                }
            }
            info!("Outbox reconciler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_channel::{outbox, BrokerActor, BrokerClient, OrderEvent, OutboxStatus};
    use crate::clients::ActorClient;
    use crate::model::OrderStatus;
    use rust_decimal::Decimal;

    fn event(order_id: &str) -> OrderEvent {
        OrderEvent {
            order_id: order_id.into(),
            user_id: "user_1".into(),
            total_price: Decimal::new(999, 2),
            status: OrderStatus::Confirmed,
            created_at: Utc::now(),
        }
    }

    fn setup() -> (BrokerClient, OutboxClient, EventPublisher) {
        let (broker_actor, broker) = BrokerActor::new(16);
        tokio::spawn(broker_actor.run());
        let (outbox_actor, outbox) = outbox::new(16);
        tokio::spawn(outbox_actor.run());
        let publisher = EventPublisher::new(broker.clone(), outbox.clone(), "orders");
        (broker, outbox, publisher)
    }

    #[tokio::test]
    async fn test_failed_publish_is_recovered_once_broker_is_ready() {
        let (broker, outbox, publisher) = setup();

        // Exchange not declared yet: the publish fails and is recorded.
        assert!(publisher.publish(event("order_1")).await.is_err());
        let entries = outbox.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, OutboxStatus::Failed);

        broker.declare_exchange("orders").await.unwrap();
        broker.declare_queue("notifications").await.unwrap();
        broker.bind("notifications", "orders").await.unwrap();

        let reconciler = OutboxReconciler::new(outbox.clone(), publisher, 5, Duration::from_secs(5));
        let report = reconciler.reconcile_once().await.unwrap();
        assert_eq!(report, ReconcileReport { attempted: 1, published: 1, failed: 0 });

        let entry = outbox.get(entries[0].id.clone()).await.unwrap().unwrap();
        assert_eq!(entry.status, OutboxStatus::Published);
        assert_eq!(entry.attempts, 2);
        assert_eq!(broker.queue_stats("notifications").await.unwrap().ready, 1);

        // Nothing left to do.
        assert_eq!(reconciler.reconcile_once().await.unwrap(), ReconcileReport::default());
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (_broker, outbox, publisher) = setup();
        assert!(publisher.publish(event("order_1")).await.is_err());

        let reconciler = OutboxReconciler::new(outbox.clone(), publisher, 2, Duration::ZERO);
        assert_eq!(reconciler.reconcile_once().await.unwrap().failed, 1);
        assert_eq!(reconciler.reconcile_once().await.unwrap().attempted, 0);

        let entries = outbox.list().await.unwrap();
        assert_eq!(entries[0].attempts, 2);
        assert_eq!(entries[0].status, OutboxStatus::Failed);
    }
}
