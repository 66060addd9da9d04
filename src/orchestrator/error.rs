//! Error taxonomy returned to callers of the order flow.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;
use tracing::error;

use crate::clients::CollaboratorError;
use crate::model::OrderStatus;
use crate::order_actor::OrderStoreError;
use crate::stock_actor::StockError;

/// Coarse classification of an [`OrderError`], stable enough to put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    UserInvalid,
    Unauthorized,
    NotFound,
    ProductNotFound,
    InsufficientStock,
    InvalidTransition,
    Infrastructure,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("user not found: {0}")]
    UserInvalid(String),

    #[error("not authorized to access this order")]
    Unauthorized,

    #[error("order not found: {0}")]
    NotFound(String),

    #[error("product not found: {0}")]
    ProductNotFound(String),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: i64,
        available: i64,
    },

    #[error("order already cancelled")]
    AlreadyCancelled,

    #[error("cannot cancel completed order")]
    CannotCancelCompleted,

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Detail is kept for logs and tests; it never reaches the caller's message.
    #[error("service temporarily unavailable, please try again")]
    Infrastructure(String),
}

impl OrderError {
    /// Builds an `Infrastructure` error and logs the detail.
    pub fn infrastructure(detail: impl Display) -> Self {
        let detail = detail.to_string();
        error!(%detail, "Infrastructure failure");
        OrderError::Infrastructure(detail)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::InvalidInput(_) => ErrorKind::InvalidInput,
            OrderError::UserInvalid(_) => ErrorKind::UserInvalid,
            OrderError::Unauthorized => ErrorKind::Unauthorized,
            OrderError::NotFound(_) => ErrorKind::NotFound,
            OrderError::ProductNotFound(_) => ErrorKind::ProductNotFound,
            OrderError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            OrderError::AlreadyCancelled
            | OrderError::CannotCancelCompleted
            | OrderError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            OrderError::Infrastructure(_) => ErrorKind::Infrastructure,
        }
    }

    /// Whether the caller may retry: transient failures as-is, stock and catalog
    /// rejections with adjusted quantities.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Infrastructure | ErrorKind::ProductNotFound | ErrorKind::InsufficientStock
        )
    }
}

impl From<StockError> for OrderError {
    fn from(e: StockError) -> Self {
        match e {
            StockError::NotFound(product_id) => OrderError::ProductNotFound(product_id),
            StockError::InsufficientStock { product_id, requested, available } => {
                OrderError::InsufficientStock { product_id, requested, available }
            }
            other => OrderError::infrastructure(other),
        }
    }
}

impl From<OrderStoreError> for OrderError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::NotFound(order_id) => OrderError::NotFound(order_id),
            OrderStoreError::InvalidTransition { from, to } => OrderError::InvalidTransition { from, to },
            OrderStoreError::NotPending(from) => OrderError::InvalidTransition { from, to: OrderStatus::Confirmed },
            OrderStoreError::InvalidOrder(reason) => OrderError::InvalidInput(reason),
            OrderStoreError::Unavailable(detail) => OrderError::infrastructure(detail),
        }
    }
}

impl From<CollaboratorError> for OrderError {
    fn from(e: CollaboratorError) -> Self {
        OrderError::infrastructure(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_hides_detail() {
        let err = OrderError::infrastructure("connection refused 10.0.0.7:5672");
        assert_eq!(err.to_string(), "service temporarily unavailable, please try again");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_retry_policy() {
        assert!(!OrderError::InvalidInput("x".into()).is_retryable());
        assert!(!OrderError::Unauthorized.is_retryable());
        assert!(!OrderError::AlreadyCancelled.is_retryable());
        assert!(OrderError::ProductNotFound("p".into()).is_retryable());
        assert!(OrderError::InsufficientStock { product_id: "p".into(), requested: 3, available: 2 }.is_retryable());
    }

    #[test]
    fn test_stock_errors_map_to_business_rejections() {
        assert_eq!(
            OrderError::from(StockError::NotFound("p".into())),
            OrderError::ProductNotFound("p".into())
        );
        assert_eq!(
            OrderError::from(StockError::Unavailable("closed".into())).kind(),
            ErrorKind::Infrastructure
        );
    }
}
