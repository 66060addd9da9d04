//! [`ActorEntity`] implementation for [`StockRecord`].
//!
//! The actor owns every stock row and handles one request at a time, so the
//! read-check-write inside [`StockAction::Adjust`] runs with exclusive access to
//! the row and nothing can change the quantity between the check and the write.

use async_trait::async_trait;
use chrono::Utc;

use super::actions::StockAction;
use super::error::StockError;
use crate::framework::ActorEntity;
use crate::model::{ProductId, StockCreate, StockRecord};

#[async_trait]
impl ActorEntity for StockRecord {
    type Id = ProductId;
    type Create = StockCreate;
    type Update = ();
    type Action = StockAction;
    type ActionResult = i64;
    type Error = StockError;

    fn from_create_params(id: ProductId, params: StockCreate) -> Result<Self, StockError> {
        if params.quantity < 0 {
            return Err(StockError::InvalidQuantity(params.quantity));
        }
        Ok(Self {
            product_id: id,
            quantity: params.quantity,
            updated_at: Utc::now(),
        })
    }

    /// Rows only change through [`StockAction::Adjust`].
    async fn on_update(&mut self, _update: ()) -> Result<(), StockError> {
        Ok(())
    }

    async fn handle_action(&mut self, action: StockAction) -> Result<i64, StockError> {
        match action {
            StockAction::Level => Ok(self.quantity),
            StockAction::Adjust(delta) => {
                let next = self.quantity.saturating_add(delta);
                if next < 0 {
                    return Err(StockError::InsufficientStock {
                        product_id: self.product_id.clone(),
                        requested: delta.saturating_neg(),
                        available: self.quantity,
                    });
                }
                self.quantity = next;
                self.updated_at = Utc::now();
                Ok(next)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(quantity: i64) -> StockRecord {
        StockRecord::from_create_params(
            "product_1".into(),
            StockCreate { product_id: "product_1".into(), quantity },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_adjust_reserves_and_releases() {
        let mut record = row(5);
        assert_eq!(record.handle_action(StockAction::Adjust(-3)).await.unwrap(), 2);
        assert_eq!(record.handle_action(StockAction::Adjust(3)).await.unwrap(), 5);
        assert_eq!(record.handle_action(StockAction::Level).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_overdraw_is_rejected_without_change() {
        let mut record = row(2);
        let err = record.handle_action(StockAction::Adjust(-3)).await.unwrap_err();
        assert_eq!(
            err,
            StockError::InsufficientStock { product_id: "product_1".into(), requested: 3, available: 2 }
        );
        assert_eq!(record.quantity, 2);
    }

    #[tokio::test]
    async fn test_reserving_exactly_everything_leaves_zero() {
        let mut record = row(4);
        assert_eq!(record.handle_action(StockAction::Adjust(-4)).await.unwrap(), 0);
        assert!(record.handle_action(StockAction::Adjust(-1)).await.is_err());
    }

    #[test]
    fn test_negative_opening_quantity_is_rejected() {
        let err = StockRecord::from_create_params(
            "p".into(),
            StockCreate { product_id: "p".into(), quantity: -1 },
        )
        .unwrap_err();
        assert_eq!(err, StockError::InvalidQuantity(-1));
    }
}
