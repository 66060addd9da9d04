use tracing::{error, info, instrument, warn};

use super::broker::{BrokerClient, ChannelError};
use super::event::OrderEvent;
use super::outbox::{OutboxClient, OutboxEntry};

/// Publishes order events to the fan-out exchange and records each outcome in the outbox.
#[derive(Clone)]
pub struct EventPublisher {
    broker: BrokerClient,
    outbox: OutboxClient,
    exchange: String,
}

impl EventPublisher {
    pub fn new(broker: BrokerClient, outbox: OutboxClient, exchange: impl Into<String>) -> Self {
        Self {
            broker,
            outbox,
            exchange: exchange.into(),
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Hands the event to a detached task. The caller never waits for the broker and
    /// failures are only logged; the outbox keeps the event for the reconciler.
    pub fn spawn_publish(&self, event: OrderEvent) {
        let publisher = self.clone();
        tokio::spawn(async move {
            let order_id = event.order_id.clone();
            if let Err(e) = publisher.publish(event).await {
                warn!(%order_id, error = %e, "Event publish failed");
            }
        });
    }

    /// Records the event in the outbox, then publishes it.
    #[instrument(skip(self, event), fields(order_id = %event.order_id, status = %event.status))]
    pub async fn publish(&self, event: OrderEvent) -> Result<(), ChannelError> {
        match self.outbox.record(event.clone()).await {
            Ok(entry) => self.publish_entry(&entry).await,
            Err(e) => {
                // Without an outbox entry the reconciler cannot help; still try the broker once.
                error!(error = %e, "Outbox unavailable, publishing untracked");
                self.send(&event).await.map(|_| ())
            }
        }
    }

    /// Publishes an outbox entry and marks the result on it.
    pub async fn publish_entry(&self, entry: &OutboxEntry) -> Result<(), ChannelError> {
        let result = self.send(&entry.event).await;
        let marked = match &result {
            Ok(routed) => {
                info!(entry_id = %entry.id, routed, "Event published");
                self.outbox.mark_published(&entry.id).await
            }
            Err(e) => self.outbox.mark_failed(&entry.id, e.to_string()).await,
        };
        if let Err(e) = marked {
            warn!(entry_id = %entry.id, error = %e, "Could not record publish outcome");
        }
        result.map(|_| ())
    }

    async fn send(&self, event: &OrderEvent) -> Result<usize, ChannelError> {
        let body = event.to_json()?;
        self.broker.publish(&self.exchange, body).await
    }
}
