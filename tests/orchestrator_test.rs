use async_trait::async_trait;
use order_lifecycle::clients::{
    ActorClient, Catalog, CollaboratorError, OrderStoreClient, ProductInfo, StockClient, UserClient,
};
use order_lifecycle::config::Config;
use order_lifecycle::event_channel::{outbox, BrokerActor, EventPublisher, OutboxClient};
use order_lifecycle::framework::mock::{create_mock_client, expect_action, MockClient};
use order_lifecycle::framework::{FrameworkError, ResourceClient, ResourceRequest};
use order_lifecycle::model::{OrderLine, OrderStatus, StockRecord, User};
use order_lifecycle::orchestrator::{ErrorKind, OrderError, OrderOrchestrator};
use order_lifecycle::stock_actor::{StockAction, StockError};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Catalog that advertises plenty of every product at a fixed price.
struct GenerousCatalog;

#[async_trait]
impl Catalog for GenerousCatalog {
    async fn get_products(&self, ids: &[String]) -> Result<HashMap<String, ProductInfo>, CollaboratorError> {
        Ok(ids
            .iter()
            .map(|id| (id.clone(), ProductInfo { price: Decimal::new(1000, 2), stock: 100 }))
            .collect())
    }
}

fn insufficient(product_id: &str, requested: i64, available: i64) -> FrameworkError {
    FrameworkError::EntityError(Box::new(StockError::InsufficientStock {
        product_id: product_id.into(),
        requested,
        available,
    }))
}

/// Real order store, broker and outbox; mocked identity and ledger.
fn orchestrator(users: &MockClient<User>, ledger: &MockClient<StockRecord>) -> (OrderOrchestrator, OrderStoreClient) {
    let (orchestrator, store, _outbox) = orchestrator_with(users, ledger.client());
    (orchestrator, store)
}

/// Like [`orchestrator`], for tests that drive the ledger by hand or read the outbox.
fn orchestrator_with(
    users: &MockClient<User>,
    ledger: ResourceClient<StockRecord>,
) -> (OrderOrchestrator, OrderStoreClient, OutboxClient) {
    let (store_actor, store) = order_lifecycle::order_actor::new(16);
    tokio::spawn(store_actor.run());
    let (broker_actor, broker) = BrokerActor::new(16);
    tokio::spawn(broker_actor.run());
    let (outbox_actor, outbox) = outbox::new(16);
    tokio::spawn(outbox_actor.run());

    let orchestrator = OrderOrchestrator::new(
        store.clone(),
        StockClient::new(ledger),
        Arc::new(UserClient::new(users.client())),
        Arc::new(GenerousCatalog),
        EventPublisher::new(broker, outbox.clone(), "orders"),
        &Config::default(),
    );
    (orchestrator, store, outbox)
}

/// Waits for the detached publish of an event with `status`.
async fn outbox_has(outbox: &OutboxClient, status: OrderStatus) -> bool {
    for _ in 0..50 {
        if outbox.list().await.unwrap().iter().any(|entry| entry.event.status == status) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

fn known_user(users: &mut MockClient<User>) {
    users
        .expect_get("user_1".to_string())
        .return_ok(Some(User::new("user_1", "Alice", "alice@example.com")));
}

/// Pattern 2: Actor + Mocks.
/// The third reservation fails; the two before it are released newest first.
#[tokio::test]
async fn test_compensation_releases_in_reverse_order() {
    let mut users = MockClient::<User>::new();
    let mut ledger = MockClient::<StockRecord>::new();
    known_user(&mut users);

    ledger.expect_action("a".to_string()).return_ok(9);
    ledger.expect_action("b".to_string()).return_ok(9);
    ledger.expect_action("c".to_string()).return_err(insufficient("c", 1, 0));
    ledger.expect_action("b".to_string()).return_ok(10);
    ledger.expect_action("a".to_string()).return_ok(10);

    let (orchestrator, store) = orchestrator(&users, &ledger);
    let err = orchestrator
        .create_order(
            "user_1",
            vec![OrderLine::new("a", 1), OrderLine::new("b", 1), OrderLine::new("c", 1)],
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        OrderError::InsufficientStock { product_id: "c".into(), requested: 1, available: 0 }
    );
    let orders = store.list().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Cancelled);

    users.verify();
    ledger.verify();
}

/// The second of three reservations fails: the third is never attempted and only
/// the first is released.
#[tokio::test]
async fn test_middle_item_failure_stops_before_the_rest() {
    let mut users = MockClient::<User>::new();
    let mut ledger = MockClient::<StockRecord>::new();
    known_user(&mut users);

    ledger.expect_action("a".to_string()).return_ok(8);
    ledger.expect_action("b".to_string()).return_err(insufficient("b", 1, 0));
    ledger.expect_action("a".to_string()).return_ok(10);

    let (orchestrator, store) = orchestrator(&users, &ledger);
    let err = orchestrator
        .create_order(
            "user_1",
            vec![OrderLine::new("a", 2), OrderLine::new("b", 1), OrderLine::new("c", 1)],
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        OrderError::InsufficientStock { product_id: "b".into(), requested: 1, available: 0 }
    );
    let orders = store.list().await.unwrap();
    assert_eq!(orders[0].status, OrderStatus::Cancelled);
    let reserved: Vec<_> = orders[0].reserved_items().into_iter().map(|item| item.product_id).collect();
    assert_eq!(reserved, vec!["a"]);

    ledger.verify();
}

#[tokio::test]
async fn test_failed_release_is_infrastructure() {
    let mut users = MockClient::<User>::new();
    let mut ledger = MockClient::<StockRecord>::new();
    known_user(&mut users);

    ledger.expect_action("a".to_string()).return_ok(4);
    ledger.expect_action("b".to_string()).return_err(insufficient("b", 2, 1));
    ledger.expect_action("a".to_string()).return_err(FrameworkError::ActorClosed);

    let (orchestrator, store) = orchestrator(&users, &ledger);
    let err = orchestrator
        .create_order("user_1", vec![OrderLine::new("a", 1), OrderLine::new("b", 2)])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Infrastructure);
    assert!(err.is_retryable());
    // The order is still cancelled so it never looks confirmed.
    assert_eq!(store.list().await.unwrap()[0].status, OrderStatus::Cancelled);

    ledger.verify();
}

#[tokio::test]
async fn test_cancel_with_failed_release_keeps_order_cancelled() {
    let mut users = MockClient::<User>::new();
    let mut ledger = MockClient::<StockRecord>::new();
    known_user(&mut users);

    ledger.expect_action("a".to_string()).return_ok(7);
    ledger.expect_action("a".to_string()).return_err(FrameworkError::ActorClosed);

    let (orchestrator, _store) = orchestrator(&users, &ledger);
    let order = orchestrator
        .create_order("user_1", vec![OrderLine::new("a", 3)])
        .await
        .unwrap();

    let err = orchestrator.cancel_order(&order.id, "user_1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Infrastructure);
    assert_eq!(
        orchestrator.get_order_status(&order.id, "user_1").await.unwrap(),
        OrderStatus::Cancelled
    );
    assert_eq!(
        orchestrator.cancel_order(&order.id, "user_1").await,
        Err(OrderError::AlreadyCancelled)
    );

    ledger.verify();
}

#[tokio::test]
async fn test_cancel_with_failed_release_still_publishes_event() {
    let mut users = MockClient::<User>::new();
    let mut ledger = MockClient::<StockRecord>::new();
    known_user(&mut users);

    ledger.expect_action("a".to_string()).return_ok(4);
    ledger.expect_action("a".to_string()).return_err(FrameworkError::ActorClosed);

    let (orchestrator, _store, outbox) = orchestrator_with(&users, ledger.client());
    let order = orchestrator
        .create_order("user_1", vec![OrderLine::new("a", 1)])
        .await
        .unwrap();

    let err = orchestrator.cancel_order(&order.id, "user_1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Infrastructure);
    assert!(outbox_has(&outbox, OrderStatus::Cancelled).await, "no cancelled event recorded");

    ledger.verify();
}

type LedgerRequests = mpsc::Receiver<ResourceRequest<StockRecord>>;
type HeldReply = oneshot::Sender<Result<i64, FrameworkError>>;

/// The caller gives up on a checkout of `a×3, b×1` while the ledger is still
/// holding its answer for `b`, then cancels the order. Checks that the cancel
/// releases `a` alone and hands back the unanswered reply for `b`.
async fn cancel_mid_checkout(users: &MockClient<User>) -> (OrderOrchestrator, String, LedgerRequests, HeldReply) {
    let (ledger, mut requests) = create_mock_client::<StockRecord>(8);
    let (orchestrator, store, _outbox) = orchestrator_with(users, ledger);

    let (placed, held) = tokio::join!(
        tokio::time::timeout(
            Duration::from_millis(100),
            orchestrator.create_order("user_1", vec![OrderLine::new("a", 3), OrderLine::new("b", 1)]),
        ),
        async {
            let (id, action, respond_to) = expect_action(&mut requests).await.expect("reserve a");
            assert_eq!((id.as_str(), action), ("a", StockAction::Adjust(-3)));
            respond_to.send(Ok(97)).unwrap();

            let (id, action, respond_to) = expect_action(&mut requests).await.expect("reserve b");
            assert_eq!((id.as_str(), action), ("b", StockAction::Adjust(-1)));
            respond_to
        }
    );
    assert!(placed.is_err(), "checkout should have hit the deadline");

    let order = store.list().await.unwrap().remove(0);
    assert_eq!(order.status, OrderStatus::Pending);

    let (cancelled, release) = tokio::join!(orchestrator.cancel_order(&order.id, "user_1"), async {
        let (id, action, respond_to) = expect_action(&mut requests).await.expect("release a");
        respond_to.send(Ok(100)).unwrap();
        (id, action)
    });
    cancelled.unwrap();
    assert_eq!(release, ("a".to_string(), StockAction::Adjust(3)));

    (orchestrator, order.id, requests, held)
}

/// The reservation recorded before the deadline goes back on cancel, and the
/// checkout task returns `b` itself once the ledger answers.
#[tokio::test]
async fn test_cancel_after_caller_deadline_releases_reserved_stock() {
    let mut users = MockClient::<User>::new();
    known_user(&mut users);
    let (orchestrator, order_id, mut requests, held) = cancel_mid_checkout(&users).await;

    // The ledger finally takes b for an order that is already cancelled.
    held.send(Ok(99)).unwrap();
    let (id, action, respond_to) = expect_action(&mut requests).await.expect("release b");
    assert_eq!((id.as_str(), action), ("b", StockAction::Adjust(1)));
    respond_to.send(Ok(100)).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(requests.try_recv().is_err(), "nothing is released twice");
    assert_eq!(
        orchestrator.get_order_status(&order_id, "user_1").await.unwrap(),
        OrderStatus::Cancelled
    );
    users.verify();
}

/// The held reservation fails after the user already cancelled. The checkout's own
/// compensation finds the order cancelled and leaves the stock alone.
#[tokio::test]
async fn test_late_reservation_failure_after_cancel_releases_nothing() {
    let mut users = MockClient::<User>::new();
    known_user(&mut users);
    let (orchestrator, order_id, mut requests, held) = cancel_mid_checkout(&users).await;

    held.send(Err(insufficient("b", 1, 0))).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(requests.try_recv().is_err(), "a was already released by the cancel");
    assert_eq!(
        orchestrator.get_order_status(&order_id, "user_1").await.unwrap(),
        OrderStatus::Cancelled
    );
    users.verify();
}

#[tokio::test]
async fn test_duplicate_lines_reserve_once() {
    let mut users = MockClient::<User>::new();
    let mut ledger = MockClient::<StockRecord>::new();
    known_user(&mut users);
    ledger.expect_action("a".to_string()).return_ok(95);

    let (orchestrator, _store) = orchestrator(&users, &ledger);
    let order = orchestrator
        .create_order("user_1", vec![OrderLine::new("a", 2), OrderLine::new("a", 3)])
        .await
        .unwrap();

    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 5);
    assert_eq!(order.total_price, Decimal::new(5000, 2));

    ledger.verify();
}

#[tokio::test]
async fn test_identity_outage_stores_nothing() {
    let mut users = MockClient::<User>::new();
    let ledger = MockClient::<StockRecord>::new();
    users.expect_get("user_1".to_string()).return_err(FrameworkError::ActorClosed);

    let (orchestrator, store) = orchestrator(&users, &ledger);
    let err = orchestrator
        .create_order("user_1", vec![OrderLine::new("a", 1)])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Infrastructure);
    assert!(store.list().await.unwrap().is_empty());
    users.verify();
}
