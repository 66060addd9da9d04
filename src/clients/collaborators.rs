//! Collaborator interfaces consumed by the order flow.
//!
//! The orchestrator depends on these traits rather than on concrete actors, so an
//! identity service or catalog living elsewhere can be plugged in. The in-process
//! implementations are [`UserClient`](crate::clients::UserClient) and [`ProductCatalog`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::clients::actor_client::ActorClient;
use crate::clients::{ProductClient, StockClient};
use crate::model::ProductId;
use crate::stock_actor::StockError;

/// A collaborator could not answer.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollaboratorError {
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Authoritative price and currently known availability of a product.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductInfo {
    pub price: Decimal,
    pub stock: i64,
}

/// Identity validation.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn user_exists(&self, user_id: &str) -> Result<bool, CollaboratorError>;
}

/// Catalog lookup. Unknown ids are simply absent from the returned map.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_products(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, ProductInfo>, CollaboratorError>;
}

/// Catalog backed by the product actor (prices) and the stock ledger (availability).
///
/// Availability read here is a snapshot: it only feeds the advisory pre-check.
#[derive(Clone)]
pub struct ProductCatalog {
    products: ProductClient,
    stock: StockClient,
}

impl ProductCatalog {
    pub fn new(products: ProductClient, stock: StockClient) -> Self {
        Self { products, stock }
    }
}

#[async_trait]
impl Catalog for ProductCatalog {
    #[instrument(skip(self))]
    async fn get_products(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, ProductInfo>, CollaboratorError> {
        let mut found = HashMap::with_capacity(ids.len());
        for id in ids {
            let Some(product) = self
                .products
                .get(id.clone())
                .await
                .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?
            else {
                debug!(product_id = %id, "Not in catalog");
                continue;
            };

            let stock = match self.stock.level(id).await {
                Ok(level) => level,
                Err(StockError::NotFound(_)) => 0,
                Err(e) => return Err(CollaboratorError::Unavailable(e.to_string())),
            };
            found.insert(id.clone(), ProductInfo { price: product.price, stock });
        }
        Ok(found)
    }
}
