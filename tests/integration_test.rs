use order_lifecycle::clients::ActorClient;
use order_lifecycle::config::Config;
use order_lifecycle::lifecycle::OrderSystem;
use order_lifecycle::model::{OrderLine, OrderStatus, ProductUpdate, User, UserCreate};
use order_lifecycle::orchestrator::OrderError;
use rust_decimal::Decimal;
use std::future::Future;
use std::time::Duration;

/// Polls `check` until it returns true or two seconds pass.
async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

async fn system_with_user() -> (OrderSystem, User) {
    let system = OrderSystem::new(Config::default()).await.expect("Failed to start system");
    let user = system
        .user_client
        .create_user(UserCreate {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
        })
        .await
        .expect("Failed to create user");
    (system, user)
}

/// Full end-to-end run: checkout, stock, event, notification.
#[tokio::test]
async fn test_checkout_confirms_and_notifies() {
    let (system, user) = system_with_user().await;
    let laptop = system.add_product("Laptop", Decimal::new(129999, 2), 10).await.unwrap();
    let mouse = system.add_product("Mouse", Decimal::new(2999, 2), 50).await.unwrap();

    let order = system
        .orchestrator
        .create_order(&user.id, vec![OrderLine::new(&laptop.id, 1), OrderLine::new(&mouse.id, 1)])
        .await
        .expect("Failed to create order");

    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(order.total_price, Decimal::new(132998, 2));
    assert_eq!(order.items.len(), 2);
    assert_eq!(system.stock_client.level(&laptop.id).await.unwrap(), 9);
    assert_eq!(system.stock_client.level(&mouse.id).await.unwrap(), 49);

    let stored = system.order_store.get(order.id.clone()).await.unwrap().expect("Order not found");
    assert_eq!(stored, order);

    let log = system.notification_log.clone();
    let order_id = order.id.clone();
    assert!(
        eventually(|| {
            let log = log.clone();
            let order_id = order_id.clone();
            async move { log.was_sent(&order_id, OrderStatus::Confirmed).await.unwrap_or(false) }
        })
        .await,
        "confirmation was never sent"
    );

    let records = system.notification_log.list().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_id, user.id);
    assert_eq!(
        records[0].message,
        format!("Your order {} has been confirmed! Total: $1329.98", order.id)
    );

    drop(log);
    system.shutdown().await.expect("Failed to shutdown system");
}

#[tokio::test]
async fn test_concurrent_orders_never_oversell() {
    let (system, user) = system_with_user().await;
    let widget = system.add_product("Widget", Decimal::new(1000, 2), 5).await.unwrap();

    let (first, second) = tokio::join!(
        system.orchestrator.create_order(&user.id, vec![OrderLine::new(&widget.id, 3)]),
        system.orchestrator.create_order(&user.id, vec![OrderLine::new(&widget.id, 3)]),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(OrderError::InsufficientStock { requested: 3, .. }))));
    assert_eq!(system.stock_client.level(&widget.id).await.unwrap(), 2);

    // The loser was stored and then cancelled; the winner holds the stock.
    let orders = system.orchestrator.list_user_orders(&user.id, 1, 10).await.unwrap();
    let mut statuses: Vec<_> = orders.iter().map(|o| o.status).collect();
    statuses.sort_by_key(|s| s.as_str());
    assert_eq!(statuses, vec![OrderStatus::Cancelled, OrderStatus::Confirmed]);

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cancel_restores_stock_once_and_notifies() {
    let (system, user) = system_with_user().await;
    let widget = system.add_product("Widget", Decimal::new(500, 2), 5).await.unwrap();

    let order = system
        .orchestrator
        .create_order(&user.id, vec![OrderLine::new(&widget.id, 3)])
        .await
        .unwrap();
    assert_eq!(system.stock_client.level(&widget.id).await.unwrap(), 2);

    system.orchestrator.cancel_order(&order.id, &user.id).await.unwrap();
    assert_eq!(system.stock_client.level(&widget.id).await.unwrap(), 5);

    assert_eq!(
        system.orchestrator.cancel_order(&order.id, &user.id).await,
        Err(OrderError::AlreadyCancelled)
    );
    assert_eq!(system.stock_client.level(&widget.id).await.unwrap(), 5);

    let log = system.notification_log.clone();
    let order_id = order.id.clone();
    assert!(
        eventually(|| {
            let log = log.clone();
            let order_id = order_id.clone();
            async move { log.was_sent(&order_id, OrderStatus::Cancelled).await.unwrap_or(false) }
        })
        .await
    );

    drop(log);
    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_status_only_moves_forward() {
    let (system, user) = system_with_user().await;
    let widget = system.add_product("Widget", Decimal::ONE, 5).await.unwrap();

    let order = system
        .orchestrator
        .create_order(&user.id, vec![OrderLine::new(&widget.id, 1)])
        .await
        .unwrap();
    system.orchestrator.complete_order(&order.id).await.unwrap();

    assert_eq!(
        system.orchestrator.cancel_order(&order.id, &user.id).await,
        Err(OrderError::CannotCancelCompleted)
    );
    assert_eq!(
        system.orchestrator.get_order_status(&order.id, &user.id).await.unwrap(),
        OrderStatus::Completed
    );
    assert_eq!(system.stock_client.level(&widget.id).await.unwrap(), 4);

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_price_change_leaves_existing_orders_alone() {
    let (system, user) = system_with_user().await;
    let laptop = system.add_product("Laptop", Decimal::new(129999, 2), 10).await.unwrap();

    let before = system
        .orchestrator
        .create_order(&user.id, vec![OrderLine::new(&laptop.id, 2)])
        .await
        .unwrap();

    system
        .product_client
        .update_product(
            laptop.id.clone(),
            ProductUpdate { price: Some(Decimal::new(99999, 2)), ..Default::default() },
        )
        .await
        .unwrap();

    let reread = system.orchestrator.get_order(&before.id, &user.id).await.unwrap();
    assert_eq!(reread.total_price, Decimal::new(259998, 2));
    assert_eq!(reread.items[0].price, Decimal::new(129999, 2));

    let after = system
        .orchestrator
        .create_order(&user.id, vec![OrderLine::new(&laptop.id, 1)])
        .await
        .unwrap();
    assert_eq!(after.total_price, Decimal::new(99999, 2));

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_poison_message_is_dead_lettered() {
    let (system, user) = system_with_user().await;
    let config = Config::default();

    let routed = system
        .broker
        .publish(&config.orders_exchange, b"{not an order event".to_vec())
        .await
        .unwrap();
    assert_eq!(routed, 1);

    let broker = system.broker.clone();
    let queue = config.notifications_queue.clone();
    assert!(
        eventually(|| {
            let broker = broker.clone();
            let queue = queue.clone();
            async move {
                broker
                    .queue_stats(&queue)
                    .await
                    .map(|stats| stats.dead_lettered == 1 && stats.unacked == 0)
                    .unwrap_or(false)
            }
        })
        .await
    );

    // The consumer keeps going after a poison message.
    let widget = system.add_product("Widget", Decimal::ONE, 1).await.unwrap();
    let order = system
        .orchestrator
        .create_order(&user.id, vec![OrderLine::new(&widget.id, 1)])
        .await
        .unwrap();
    let log = system.notification_log.clone();
    assert!(
        eventually(|| {
            let log = log.clone();
            let order_id = order.id.clone();
            async move { log.was_sent(&order_id, OrderStatus::Confirmed).await.unwrap_or(false) }
        })
        .await
    );

    drop((broker, log));
    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_other_users_cannot_touch_an_order() {
    let (system, alice) = system_with_user().await;
    let bob = system
        .user_client
        .create_user(UserCreate { name: "Bob".into(), email: "bob@example.com".into() })
        .await
        .unwrap();
    let widget = system.add_product("Widget", Decimal::ONE, 2).await.unwrap();

    let order = system
        .orchestrator
        .create_order(&alice.id, vec![OrderLine::new(&widget.id, 2)])
        .await
        .unwrap();

    assert_eq!(system.orchestrator.get_order(&order.id, &bob.id).await, Err(OrderError::Unauthorized));
    assert_eq!(system.orchestrator.cancel_order(&order.id, &bob.id).await, Err(OrderError::Unauthorized));
    assert_eq!(system.stock_client.level(&widget.id).await.unwrap(), 0);
    assert!(system.orchestrator.list_user_orders(&bob.id, 1, 20).await.unwrap().is_empty());

    system.shutdown().await.unwrap();
}
