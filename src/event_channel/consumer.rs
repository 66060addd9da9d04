//! Subscriber side of the event channel.
//!
//! [`EventConsumer`] pulls deliveries from a queue, decodes them and settles each
//! one according to the outcome:
//!
//! | Outcome | Broker action |
//! |---|---|
//! | body does not decode (poison) | `nack`, no requeue |
//! | handler fails | `nack` with requeue |
//! | handler succeeds | `ack` |
//!
//! Because failed deliveries come back, handlers may see the same event more than once.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::broker::{ChannelError, Consumer, Delivery};
use super::event::OrderEvent;

/// A handler could not process an event. The delivery is requeued.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HandlerError {
    #[error("Handler failed: {0}")]
    Failed(String),
}

/// Why a delivery was not acknowledged.
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("Poison message: {0}")]
    Poison(#[from] serde_json::Error),
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Acked,
    Requeued,
    Rejected,
}

/// Business logic run for each decoded event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &OrderEvent) -> Result<(), HandlerError>;
}

pub struct EventConsumer {
    consumer: Consumer,
    handler: Arc<dyn EventHandler>,
}

impl EventConsumer {
    pub fn new(consumer: Consumer, handler: Arc<dyn EventHandler>) -> Self {
        Self { consumer, handler }
    }

    async fn dispatch(&self, delivery: &Delivery) -> Result<(), ConsumeError> {
        let event = OrderEvent::from_json(&delivery.body)?;
        debug!(order_id = %event.order_id, status = %event.status, "Event decoded");
        self.handler.handle(&event).await?;
        Ok(())
    }

    /// Handles one delivery and settles it with the broker.
    #[instrument(skip(self, delivery), fields(queue = %self.consumer.queue(), delivery_tag = delivery.delivery_tag, redelivered = delivery.redelivered))]
    pub async fn process(&self, delivery: Delivery) -> Result<ProcessOutcome, ChannelError> {
        match self.dispatch(&delivery).await {
            Ok(()) => {
                self.consumer.ack(delivery.delivery_tag).await?;
                Ok(ProcessOutcome::Acked)
            }
            Err(ConsumeError::Poison(e)) => {
                error!(error = %e, "Rejecting malformed message");
                self.consumer.nack(delivery.delivery_tag, false).await?;
                Ok(ProcessOutcome::Rejected)
            }
            Err(ConsumeError::Handler(e)) => {
                warn!(error = %e, "Handler failed, requeueing");
                self.consumer.nack(delivery.delivery_tag, true).await?;
                Ok(ProcessOutcome::Requeued)
            }
        }
    }

    /// Processes deliveries one at a time until `shutdown` flips to true or the broker closes.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), ChannelError> {
        info!(queue = %self.consumer.queue(), "Consumer started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                delivery = self.consumer.next() => {
                    self.process(delivery?).await?;
                }
            }
        }

        info!(queue = %self.consumer.queue(), "Consumer stopping");
        self.consumer.cancel().await
    }
}
