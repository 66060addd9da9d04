use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use crate::clients::actor_client::{recover_entity_error, ActorClient};
use crate::framework::{FrameworkError, ResourceClient};
use crate::model::{Order, OrderCreate, OrderItemCreate, OrderStatus};
use crate::order_actor::{OrderAction, OrderStoreError};

/// Client for the order store.
///
/// The store persists orders; it does not orchestrate. Validation against users,
/// the catalog and the stock ledger is done by
/// [`OrderOrchestrator`](crate::orchestrator::OrderOrchestrator).
#[derive(Clone)]
pub struct OrderStoreClient {
    inner: ResourceClient<Order>,
}

impl OrderStoreClient {
    pub fn new(inner: ResourceClient<Order>) -> Self {
        Self { inner }
    }

    /// Persists a new `pending` order with its items.
    #[instrument(skip(self, items))]
    pub async fn create(
        &self,
        user_id: &str,
        items: Vec<OrderItemCreate>,
        total_price: Decimal,
    ) -> Result<Order, OrderStoreError> {
        debug!(?items, "create called");
        let order = self
            .inner
            .create(OrderCreate { user_id: user_id.to_string(), items, total_price })
            .await
            .map_err(Self::map_error)?;
        info!(order_id = %order.id, "Order stored");
        Ok(order)
    }

    /// Orders of one user, newest first.
    #[instrument(skip(self))]
    pub async fn list_by_user(&self, user_id: &str, limit: usize, offset: usize) -> Result<Vec<Order>, OrderStoreError> {
        let mut orders: Vec<Order> = self
            .list()
            .await?
            .into_iter()
            .filter(|order| order.user_id == user_id)
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(orders.into_iter().skip(offset).take(limit).collect())
    }

    /// Moves an order along the status state machine.
    #[instrument(skip(self))]
    pub async fn transition(&self, order_id: &str, to: OrderStatus) -> Result<Order, OrderStoreError> {
        debug!("Sending request");
        self.inner
            .perform_action(order_id.to_string(), OrderAction::Transition(to))
            .await
            .map_err(Self::map_error)
    }

    /// Notes that the ledger now holds stock for one item of a pending order.
    #[instrument(skip(self))]
    pub async fn record_reservation(&self, order_id: &str, item_id: &str) -> Result<Order, OrderStoreError> {
        self.inner
            .perform_action(order_id.to_string(), OrderAction::RecordReservation(item_id.to_string()))
            .await
            .map_err(Self::map_error)
    }
}

#[async_trait]
impl ActorClient<Order> for OrderStoreClient {
    type Error = OrderStoreError;

    fn inner(&self) -> &ResourceClient<Order> {
        &self.inner
    }

    fn map_error(e: FrameworkError) -> Self::Error {
        recover_entity_error(e, OrderStoreError::NotFound, OrderStoreError::InvalidOrder, OrderStoreError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::MockClient;
    use chrono::{Duration, Utc};

    fn stored(id: &str, user_id: &str, age_secs: i64) -> Order {
        let at = Utc::now() - Duration::seconds(age_secs);
        Order {
            id: id.into(),
            user_id: user_id.into(),
            items: vec![],
            total_price: Decimal::ZERO,
            status: OrderStatus::Pending,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_list_by_user_filters_and_orders_newest_first() {
        let mut mock = MockClient::<Order>::new();
        mock.expect_list().return_ok(vec![
            stored("old", "user_1", 30),
            stored("other", "user_2", 5),
            stored("new", "user_1", 1),
            stored("mid", "user_1", 10),
        ]);
        mock.expect_list().return_ok(vec![stored("old", "user_1", 30), stored("new", "user_1", 1)]);

        let store = OrderStoreClient::new(mock.client());
        let ids: Vec<_> = store.list_by_user("user_1", 10, 0).await.unwrap().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);

        let page: Vec<_> = store.list_by_user("user_1", 1, 1).await.unwrap().into_iter().map(|o| o.id).collect();
        assert_eq!(page, vec!["old"]);

        mock.verify();
    }

    #[tokio::test]
    async fn test_transition_errors_are_typed() {
        let mut mock = MockClient::<Order>::new();
        mock.expect_action("order_1".to_string()).return_err(FrameworkError::EntityError(Box::new(
            OrderStoreError::InvalidTransition { from: OrderStatus::Completed, to: OrderStatus::Pending },
        )));
        mock.expect_action("order_1".to_string()).return_err(FrameworkError::EntityError(Box::new(
            OrderStoreError::NotPending(OrderStatus::Cancelled),
        )));

        let store = OrderStoreClient::new(mock.client());
        let err = store.transition("order_1", OrderStatus::Pending).await.unwrap_err();
        assert_eq!(
            err,
            OrderStoreError::InvalidTransition { from: OrderStatus::Completed, to: OrderStatus::Pending }
        );
        assert_eq!(
            store.record_reservation("order_1", "item_1").await,
            Err(OrderStoreError::NotPending(OrderStatus::Cancelled))
        );
        mock.verify();
    }
}
