//! # In-process message broker
//!
//! A small fan-out broker with durable queues and acknowledged, pull-based delivery.
//!
//! - **Exchanges** broadcast: a publish copies the body into every bound queue.
//! - **Queues** hold messages until acknowledged, whether or not a consumer is attached.
//! - **Consumers** pull one message at a time and may hold at most `prefetch`
//!   unacknowledged deliveries. Unacknowledged deliveries go back to the head of the
//!   queue when the consumer nacks with requeue, cancels or is dropped.
//!
//! Like [`ResourceActor`](crate::framework::ResourceActor), the broker is a single task
//! that owns all state and processes one request at a time; [`BrokerClient`] is the
//! cloneable handle.

use std::collections::{BTreeMap, HashMap, VecDeque};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

/// Errors raised by the broker.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),
    #[error("Unknown queue: {0}")]
    UnknownQueue(String),
    #[error("Unknown consumer {consumer} on queue {queue}")]
    UnknownConsumer { queue: String, consumer: u64 },
    #[error("Unknown delivery tag {tag} on queue {queue}")]
    UnknownDeliveryTag { queue: String, tag: u64 },
    #[error("Prefetch must be at least 1")]
    InvalidPrefetch,
    #[error("Broker closed")]
    Closed,
    #[error("Could not encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A message handed to a consumer. Must be acked or nacked with its `delivery_tag`.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub body: Vec<u8>,
    pub redelivered: bool,
}

/// Point-in-time counters for one queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub ready: usize,
    pub unacked: usize,
    pub consumers: usize,
    pub dead_lettered: u64,
}

type Reply<T> = oneshot::Sender<Result<T, ChannelError>>;

#[derive(Debug)]
enum BrokerRequest {
    DeclareExchange { name: String, respond_to: Reply<()> },
    DeclareQueue { name: String, respond_to: Reply<()> },
    Bind { queue: String, exchange: String, respond_to: Reply<()> },
    Publish { exchange: String, body: Vec<u8>, respond_to: Reply<usize> },
    Consume { queue: String, prefetch: usize, respond_to: Reply<u64> },
    Fetch { queue: String, consumer: u64, respond_to: Reply<Delivery> },
    Ack { queue: String, tag: u64, respond_to: Reply<()> },
    Nack { queue: String, tag: u64, requeue: bool, respond_to: Reply<()> },
    Cancel { queue: String, consumer: u64, respond_to: Option<Reply<()>> },
    Stats { queue: String, respond_to: Reply<QueueStats> },
}

#[derive(Debug)]
struct Message {
    body: Vec<u8>,
    redelivered: bool,
}

#[derive(Debug)]
struct ConsumerState {
    prefetch: usize,
    in_flight: usize,
    waiting: Option<Reply<Delivery>>,
}

#[derive(Debug)]
struct Unacked {
    consumer: u64,
    message: Message,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Message>,
    unacked: BTreeMap<u64, Unacked>,
    consumers: BTreeMap<u64, ConsumerState>,
    dead_lettered: u64,
    next_tag: u64,
}

impl QueueState {
    /// Hands ready messages to waiting consumers that are under their prefetch limit.
    fn dispatch(&mut self, queue: &str) {
        for (&consumer_id, consumer) in self.consumers.iter_mut() {
            if consumer.in_flight >= consumer.prefetch || consumer.waiting.is_none() {
                continue;
            }
            let Some(message) = self.ready.pop_front() else {
                return;
            };
            let Some(waiting) = consumer.waiting.take() else {
                self.ready.push_front(message);
                continue;
            };

            self.next_tag += 1;
            let tag = self.next_tag;
            let delivery = Delivery {
                delivery_tag: tag,
                body: message.body.clone(),
                redelivered: message.redelivered,
            };
            if waiting.send(Ok(delivery)).is_ok() {
                debug!(queue, consumer = consumer_id, delivery_tag = tag, "Delivered");
                consumer.in_flight += 1;
                self.unacked.insert(tag, Unacked { consumer: consumer_id, message });
            } else {
                // The fetch was abandoned before the delivery arrived.
                self.ready.push_front(message);
            }
        }
    }

    fn settle(&mut self, queue: &str, tag: u64) -> Result<Unacked, ChannelError> {
        let entry = self.unacked.remove(&tag).ok_or_else(|| ChannelError::UnknownDeliveryTag {
            queue: queue.to_string(),
            tag,
        })?;
        if let Some(consumer) = self.consumers.get_mut(&entry.consumer) {
            consumer.in_flight = consumer.in_flight.saturating_sub(1);
        }
        Ok(entry)
    }

    fn stats(&self) -> QueueStats {
        QueueStats {
            ready: self.ready.len(),
            unacked: self.unacked.len(),
            consumers: self.consumers.len(),
            dead_lettered: self.dead_lettered,
        }
    }
}

/// The broker task. Owns every exchange and queue.
pub struct BrokerActor {
    receiver: mpsc::Receiver<BrokerRequest>,
    exchanges: HashMap<String, Vec<String>>,
    queues: HashMap<String, QueueState>,
    next_consumer: u64,
}

impl BrokerActor {
    /// Creates a new broker and its client.
    pub fn new(buffer_size: usize) -> (Self, BrokerClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            receiver,
            exchanges: HashMap::new(),
            queues: HashMap::new(),
            next_consumer: 0,
        };
        (actor, BrokerClient { sender })
    }

    fn queue_mut(&mut self, name: &str) -> Result<&mut QueueState, ChannelError> {
        self.queues
            .get_mut(name)
            .ok_or_else(|| ChannelError::UnknownQueue(name.to_string()))
    }

    /// Runs the broker loop until every client (and every consumer) is dropped.
    pub async fn run(mut self) {
        info!("Broker started");

        while let Some(request) = self.receiver.recv().await {
            match request {
                BrokerRequest::DeclareExchange { name, respond_to } => {
                    if !self.exchanges.contains_key(&name) {
                        info!(exchange = %name, "Exchange declared");
                        self.exchanges.insert(name, Vec::new());
                    }
                    let _ = respond_to.send(Ok(()));
                }
                BrokerRequest::DeclareQueue { name, respond_to } => {
                    if !self.queues.contains_key(&name) {
                        info!(queue = %name, "Queue declared");
                        self.queues.insert(name, QueueState::default());
                    }
                    let _ = respond_to.send(Ok(()));
                }
                BrokerRequest::Bind { queue, exchange, respond_to } => {
                    let result = if !self.queues.contains_key(&queue) {
                        Err(ChannelError::UnknownQueue(queue))
                    } else if let Some(bound) = self.exchanges.get_mut(&exchange) {
                        if !bound.contains(&queue) {
                            info!(%queue, %exchange, "Queue bound");
                            bound.push(queue);
                        }
                        Ok(())
                    } else {
                        Err(ChannelError::UnknownExchange(exchange))
                    };
                    let _ = respond_to.send(result);
                }
                BrokerRequest::Publish { exchange, body, respond_to } => {
                    let Some(bound) = self.exchanges.get(&exchange) else {
                        warn!(%exchange, "Publish to unknown exchange");
                        let _ = respond_to.send(Err(ChannelError::UnknownExchange(exchange)));
                        continue;
                    };
                    let mut routed = 0;
                    for queue in bound {
                        if let Some(state) = self.queues.get_mut(queue) {
                            state.ready.push_back(Message { body: body.clone(), redelivered: false });
                            state.dispatch(queue);
                            routed += 1;
                        }
                    }
                    if routed == 0 {
                        debug!(%exchange, "No bound queues, message dropped");
                    }
                    let _ = respond_to.send(Ok(routed));
                }
                BrokerRequest::Consume { queue, prefetch, respond_to } => {
                    if prefetch == 0 {
                        let _ = respond_to.send(Err(ChannelError::InvalidPrefetch));
                        continue;
                    }
                    self.next_consumer += 1;
                    let consumer = self.next_consumer;
                    let result = self.queue_mut(&queue).map(|state| {
                        state.consumers.insert(consumer, ConsumerState { prefetch, in_flight: 0, waiting: None });
                        consumer
                    });
                    if result.is_ok() {
                        info!(%queue, consumer, prefetch, "Consumer attached");
                    }
                    let _ = respond_to.send(result);
                }
                BrokerRequest::Fetch { queue, consumer, respond_to } => {
                    let state = match self.queue_mut(&queue) {
                        Ok(state) => state,
                        Err(e) => {
                            let _ = respond_to.send(Err(e));
                            continue;
                        }
                    };
                    let Some(slot) = state.consumers.get_mut(&consumer) else {
                        let _ = respond_to.send(Err(ChannelError::UnknownConsumer { queue, consumer }));
                        continue;
                    };
                    slot.waiting = Some(respond_to);
                    state.dispatch(&queue);
                }
                BrokerRequest::Ack { queue, tag, respond_to } => {
                    let result = self.queue_mut(&queue).and_then(|state| {
                        state.settle(&queue, tag)?;
                        state.dispatch(&queue);
                        Ok(())
                    });
                    debug!(%queue, delivery_tag = tag, ok = result.is_ok(), "Ack");
                    let _ = respond_to.send(result);
                }
                BrokerRequest::Nack { queue, tag, requeue, respond_to } => {
                    let result = self.queue_mut(&queue).and_then(|state| {
                        let entry = state.settle(&queue, tag)?;
                        if requeue {
                            state.ready.push_front(Message { body: entry.message.body, redelivered: true });
                        } else {
                            state.dead_lettered += 1;
                        }
                        state.dispatch(&queue);
                        Ok(())
                    });
                    debug!(%queue, delivery_tag = tag, requeue, ok = result.is_ok(), "Nack");
                    let _ = respond_to.send(result);
                }
                BrokerRequest::Cancel { queue, consumer, respond_to } => {
                    let result = self.queue_mut(&queue).map(|state| {
                        state.consumers.remove(&consumer);
                        let tags: Vec<u64> = state
                            .unacked
                            .iter()
                            .filter(|(_, entry)| entry.consumer == consumer)
                            .map(|(tag, _)| *tag)
                            .collect();
                        // Newest first, so the oldest delivery ends up at the head.
                        for tag in tags.iter().rev() {
                            if let Some(entry) = state.unacked.remove(tag) {
                                state.ready.push_front(Message { body: entry.message.body, redelivered: true });
                            }
                        }
                        state.dispatch(&queue);
                        tags.len()
                    });
                    if let Ok(requeued) = result {
                        info!(%queue, consumer, requeued, "Consumer cancelled");
                    }
                    if let Some(respond_to) = respond_to {
                        let _ = respond_to.send(result.map(|_| ()));
                    }
                }
                BrokerRequest::Stats { queue, respond_to } => {
                    let result = self.queue_mut(&queue).map(|state| state.stats());
                    let _ = respond_to.send(result);
                }
            }
        }

        info!(queues = self.queues.len(), "Broker shutdown");
    }
}

/// Cloneable handle to the broker.
#[derive(Clone)]
pub struct BrokerClient {
    sender: mpsc::Sender<BrokerRequest>,
}

impl BrokerClient {
    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> BrokerRequest) -> Result<T, ChannelError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| ChannelError::Closed)?;
        response.await.map_err(|_| ChannelError::Closed)?
    }

    /// Declares a fan-out exchange. Idempotent.
    pub async fn declare_exchange(&self, name: &str) -> Result<(), ChannelError> {
        let name = name.to_string();
        self.request(|respond_to| BrokerRequest::DeclareExchange { name, respond_to }).await
    }

    /// Declares a durable queue. Idempotent.
    pub async fn declare_queue(&self, name: &str) -> Result<(), ChannelError> {
        let name = name.to_string();
        self.request(|respond_to| BrokerRequest::DeclareQueue { name, respond_to }).await
    }

    /// Binds a queue to an exchange. Binding twice is a no-op.
    pub async fn bind(&self, queue: &str, exchange: &str) -> Result<(), ChannelError> {
        let (queue, exchange) = (queue.to_string(), exchange.to_string());
        self.request(|respond_to| BrokerRequest::Bind { queue, exchange, respond_to }).await
    }

    /// Publishes a body to every queue bound to `exchange`. Returns how many queues received it.
    #[instrument(skip(self, body), fields(bytes = body.len()))]
    pub async fn publish(&self, exchange: &str, body: Vec<u8>) -> Result<usize, ChannelError> {
        let exchange = exchange.to_string();
        self.request(|respond_to| BrokerRequest::Publish { exchange, body, respond_to }).await
    }

    /// Attaches a consumer that may hold at most `prefetch` unacknowledged deliveries.
    #[instrument(skip(self))]
    pub async fn consume(&self, queue: &str, prefetch: usize) -> Result<Consumer, ChannelError> {
        let name = queue.to_string();
        let id = self
            .request(|respond_to| BrokerRequest::Consume { queue: name, prefetch, respond_to })
            .await?;
        Ok(Consumer {
            queue: queue.to_string(),
            id,
            client: self.clone(),
            cancelled: false,
        })
    }

    pub async fn queue_stats(&self, queue: &str) -> Result<QueueStats, ChannelError> {
        let queue = queue.to_string();
        self.request(|respond_to| BrokerRequest::Stats { queue, respond_to }).await
    }
}

/// A subscription to one queue.
///
/// Dropping the consumer returns its unacknowledged deliveries to the queue.
pub struct Consumer {
    queue: String,
    id: u64,
    client: BrokerClient,
    cancelled: bool,
}

impl Consumer {
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Waits for the next delivery. Blocks while the prefetch limit is reached.
    ///
    /// Cancel-safe: if the future is dropped before a delivery arrives, nothing is lost.
    pub async fn next(&self) -> Result<Delivery, ChannelError> {
        let (queue, consumer) = (self.queue.clone(), self.id);
        self.client
            .request(|respond_to| BrokerRequest::Fetch { queue, consumer, respond_to })
            .await
    }

    pub async fn ack(&self, delivery_tag: u64) -> Result<(), ChannelError> {
        let queue = self.queue.clone();
        self.client
            .request(|respond_to| BrokerRequest::Ack { queue, tag: delivery_tag, respond_to })
            .await
    }

    /// Rejects a delivery. With `requeue` it goes back to the head of the queue,
    /// otherwise it is dead-lettered and never delivered again.
    pub async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), ChannelError> {
        let queue = self.queue.clone();
        self.client
            .request(|respond_to| BrokerRequest::Nack { queue, tag: delivery_tag, requeue, respond_to })
            .await
    }

    /// Detaches from the queue and waits until unacknowledged deliveries are requeued.
    pub async fn cancel(mut self) -> Result<(), ChannelError> {
        self.cancelled = true;
        let (queue, consumer) = (self.queue.clone(), self.id);
        self.client
            .request(|respond_to| BrokerRequest::Cancel { queue, consumer, respond_to: Some(respond_to) })
            .await
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        if self.cancelled {
            return;
        }
        let request = BrokerRequest::Cancel {
            queue: self.queue.clone(),
            consumer: self.id,
            respond_to: None,
        };
        if let Err(mpsc::error::TrySendError::Full(request)) = self.client.sender.try_send(request) {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let sender = self.client.sender.clone();
                handle.spawn(async move {
                    let _ = sender.send(request).await;
                });
            }
        }
    }
}
