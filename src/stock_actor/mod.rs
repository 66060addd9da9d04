//! Stock ledger: the authoritative available quantity per product.

mod actions;
pub mod entity;
pub mod error;

pub use actions::*;
pub use error::*;

use crate::clients::StockClient;
use crate::framework::ResourceActor;
use crate::model::{StockCreate, StockRecord};

/// Creates a new stock ledger actor and its client. Rows are keyed by product id.
pub fn new(buffer_size: usize) -> (ResourceActor<StockRecord>, StockClient) {
    let (actor, generic_client) =
        ResourceActor::<StockRecord>::new(buffer_size, |params: &StockCreate| params.product_id.clone());
    let client = StockClient::new(generic_client);

    (actor, client)
}
