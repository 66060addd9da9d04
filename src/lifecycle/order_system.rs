use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::clients::{OrderStoreClient, ProductCatalog, ProductClient, StockClient, UserClient};
use crate::config::Config;
use crate::event_channel::{
    outbox, BrokerActor, BrokerClient, ChannelError, EventConsumer, EventPublisher, OutboxClient, OutboxReconciler,
};
use crate::model::{Product, ProductCreate};
use crate::notification::{self, LogNotifier, NotificationHandler, NotificationLogClient, Notifier};
use crate::orchestrator::OrderOrchestrator;
use crate::product_actor::ProductError;
use crate::stock_actor::StockError;

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Event channel setup failed: {0}")]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Product(#[from] ProductError),
    #[error(transparent)]
    Stock(#[from] StockError),
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

/// The running order lifecycle: every actor, the broker topology and the background
/// services, wired together.
///
/// # Architecture
///
/// - **Resource actors**: users, products, the stock ledger, the order store, the
///   outbox and the notification log
/// - **Broker**: the `orders` fan-out exchange bound to the `notifications` queue
/// - **Notification consumer**: pulls from `notifications` and runs [`NotificationHandler`]
/// - **Outbox reconciler**: republishes events that never reached the broker
/// - **Orchestrator**: the entry point for placing, cancelling and querying orders
///
/// # Example
///
/// ```ignore
/// let system = OrderSystem::new(Config::from_env()?).await?;
///
/// let user = system.user_client.create_user(user_data).await?;
/// let product = system.add_product("Laptop", price, 10).await?;
/// let order = system
///     .orchestrator
///     .create_order(&user.id, vec![OrderLine::new(product.id, 1)])
///     .await?;
///
/// system.shutdown().await?;
/// ```
pub struct OrderSystem {
    pub orchestrator: OrderOrchestrator,
    pub user_client: UserClient,
    pub product_client: ProductClient,
    pub stock_client: StockClient,
    pub order_store: OrderStoreClient,
    pub broker: BrokerClient,
    pub outbox: OutboxClient,
    pub notification_log: NotificationLogClient,

    shutdown_tx: watch::Sender<bool>,
    /// Consumer and reconciler; stopped by the shutdown signal.
    services: Vec<JoinHandle<()>>,
    /// Resource actors and the broker; stopped by dropping their clients.
    actors: Vec<JoinHandle<()>>,
}

impl OrderSystem {
    /// Starts the system with notifications written to the log.
    pub async fn new(config: Config) -> Result<Self, SystemError> {
        Self::with_notifier(config, Arc::new(LogNotifier)).await
    }

    /// Starts the system with a custom notification channel.
    ///
    /// 1. Spawns the resource actors and the broker
    /// 2. Declares the exchange and queue, and binds them
    /// 3. Builds the publisher, orchestrator and collaborators
    /// 4. Starts the notification consumer and the outbox reconciler
    pub async fn with_notifier(config: Config, notifier: Arc<dyn Notifier>) -> Result<Self, SystemError> {
        let buffer = config.actor_buffer_size;

        // 1. Actors (no dependencies between them)
        let (user_actor, user_client) = crate::user_actor::new(buffer);
        let (product_actor, product_client) = crate::product_actor::new(buffer);
        let (stock_actor, stock_client) = crate::stock_actor::new(buffer);
        let (order_actor, order_store) = crate::order_actor::new(buffer);
        let (outbox_actor, outbox) = outbox::new(buffer);
        let (log_actor, notification_log) = notification::log::new(buffer);
        let (broker_actor, broker) = BrokerActor::new(buffer);

        let actors = vec![
            tokio::spawn(user_actor.run()),
            tokio::spawn(product_actor.run()),
            tokio::spawn(stock_actor.run()),
            tokio::spawn(order_actor.run()),
            tokio::spawn(outbox_actor.run()),
            tokio::spawn(log_actor.run()),
            tokio::spawn(broker_actor.run()),
        ];

        // 2. Topology
        broker.declare_exchange(&config.orders_exchange).await?;
        broker.declare_queue(&config.notifications_queue).await?;
        broker.bind(&config.notifications_queue, &config.orders_exchange).await?;

        // 3. Order flow
        let publisher = EventPublisher::new(broker.clone(), outbox.clone(), config.orders_exchange.clone());
        let orchestrator = OrderOrchestrator::new(
            order_store.clone(),
            stock_client.clone(),
            Arc::new(user_client.clone()),
            Arc::new(ProductCatalog::new(product_client.clone(), stock_client.clone())),
            publisher.clone(),
            &config,
        );

        // 4. Background services
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let consumer = broker
            .consume(&config.notifications_queue, config.consumer_prefetch)
            .await?;
        let handler = Arc::new(NotificationHandler::new(notification_log.clone(), notifier));
        let consumer = EventConsumer::new(consumer, handler);
        let consumer_shutdown = shutdown_rx.clone();
        let consumer_handle = tokio::spawn(async move {
            if let Err(e) = consumer.run(consumer_shutdown).await {
                error!(error = %e, "Notification consumer stopped");
            }
        });

        let reconciler = OutboxReconciler::new(
            outbox.clone(),
            publisher,
            config.outbox_max_attempts,
            config.outbox_reconcile_interval,
        );
        let reconciler_handle = reconciler.spawn(config.outbox_reconcile_interval, shutdown_rx);

        info!(environment = %config.environment, "Order system started");

        Ok(Self {
            orchestrator,
            user_client,
            product_client,
            stock_client,
            order_store,
            broker,
            outbox,
            notification_log,
            shutdown_tx,
            services: vec![consumer_handle, reconciler_handle],
            actors,
        })
    }

    /// Adds a product to the catalog and opens its stock row.
    pub async fn add_product(&self, name: &str, price: Decimal, stock: i64) -> Result<Product, SystemError> {
        let product = self
            .product_client
            .create_product(ProductCreate { name: name.to_string(), price })
            .await?;
        self.stock_client.open(&product.id, stock).await?;
        info!(product_id = %product.id, stock, "Product added");
        Ok(product)
    }

    /// Gracefully shuts down the entire system.
    ///
    /// 1. Signals the consumer and reconciler and waits for them. The consumer
    ///    requeues anything it had not acknowledged.
    /// 2. Drops every client, which closes the actors' channels
    /// 3. Waits for all actor tasks to complete
    ///
    /// Publishes still in flight hold their own client clones, so the broker and the
    /// outbox stop once those finish.
    pub async fn shutdown(self) -> Result<(), SystemError> {
        info!("Shutting down system...");

        let _ = self.shutdown_tx.send(true);
        for handle in self.services {
            handle.await.map_err(|e| {
                error!("Service task failed: {:?}", e);
                SystemError::TaskFailed(e.to_string())
            })?;
        }

        drop(self.orchestrator);
        drop(self.user_client);
        drop(self.product_client);
        drop(self.stock_client);
        drop(self.order_store);
        drop(self.broker);
        drop(self.outbox);
        drop(self.notification_log);

        for handle in self.actors {
            if let Err(e) = handle.await {
                error!("Actor task failed: {:?}", e);
                return Err(SystemError::TaskFailed(e.to_string()));
            }
        }

        info!("System shutdown complete.");
        Ok(())
    }
}
