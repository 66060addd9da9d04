use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::clients::actor_client::{recover_entity_error, ActorClient};
use crate::framework::{FrameworkError, ResourceClient};
use crate::model::{StockCreate, StockRecord};
use crate::stock_actor::{StockAction, StockError};

/// Client for the stock ledger.
///
/// Every call is a single request to the ledger actor, so each adjustment is
/// applied atomically against the row. Nothing is held between calls.
#[derive(Clone)]
pub struct StockClient {
    inner: ResourceClient<StockRecord>,
}

impl StockClient {
    pub fn new(inner: ResourceClient<StockRecord>) -> Self {
        Self { inner }
    }

    /// Starts tracking a product with an initial quantity.
    #[instrument(skip(self))]
    pub async fn open(&self, product_id: &str, quantity: i64) -> Result<StockRecord, StockError> {
        debug!("Sending request");
        self.inner
            .create(StockCreate { product_id: product_id.to_string(), quantity })
            .await
            .map_err(Self::map_error)
    }

    /// Applies `delta` and returns the new quantity.
    #[instrument(skip(self))]
    pub async fn adjust(&self, product_id: &str, delta: i64) -> Result<i64, StockError> {
        debug!("Sending request");
        self.inner
            .perform_action(product_id.to_string(), StockAction::Adjust(delta))
            .await
            .map_err(Self::map_error)
    }

    pub async fn reserve(&self, product_id: &str, quantity: u32) -> Result<i64, StockError> {
        self.adjust(product_id, -i64::from(quantity)).await
    }

    pub async fn release(&self, product_id: &str, quantity: u32) -> Result<i64, StockError> {
        self.adjust(product_id, i64::from(quantity)).await
    }

    #[instrument(skip(self))]
    pub async fn level(&self, product_id: &str) -> Result<i64, StockError> {
        self.inner
            .perform_action(product_id.to_string(), StockAction::Level)
            .await
            .map_err(Self::map_error)
    }
}

#[async_trait]
impl ActorClient<StockRecord> for StockClient {
    type Error = StockError;

    fn inner(&self) -> &ResourceClient<StockRecord> {
        &self.inner
    }

    fn map_error(e: FrameworkError) -> Self::Error {
        recover_entity_error(e, StockError::NotFound, StockError::AlreadyExists, StockError::Unavailable)
    }
}
