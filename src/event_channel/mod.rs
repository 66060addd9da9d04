//! Durable fan-out transport for order lifecycle events.
//!
//! - [`broker`]: exchanges, durable queues, prefetch-limited acknowledged delivery.
//! - [`event`]: the [`OrderEvent`] wire type.
//! - [`publisher`]: fire-and-forget publishing, tracked in the [`outbox`].
//! - [`reconciler`]: redelivers outbox entries that never reached the broker.
//! - [`consumer`]: pull loop that acks, requeues or rejects each delivery.

pub mod broker;
pub mod consumer;
pub mod event;
pub mod outbox;
pub mod publisher;
pub mod reconciler;

pub use broker::{BrokerActor, BrokerClient, ChannelError, Consumer, Delivery, QueueStats};
pub use consumer::{ConsumeError, EventConsumer, EventHandler, HandlerError, ProcessOutcome};
pub use event::OrderEvent;
pub use outbox::{OutboxClient, OutboxEntry, OutboxError, OutboxStatus};
pub use publisher::EventPublisher;
pub use reconciler::{OutboxReconciler, ReconcileReport};
