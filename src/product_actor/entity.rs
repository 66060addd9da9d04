//! [`ActorEntity`] implementation for [`Product`].
//!
//! Catalog entries carry name and price only. Availability is read from the stock
//! ledger by [`ProductCatalog`](crate::clients::ProductCatalog).

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::error::ProductError;
use crate::framework::ActorEntity;
use crate::model::{Product, ProductCreate, ProductId, ProductUpdate};

fn validate_price(price: Decimal) -> Result<(), ProductError> {
    if price <= Decimal::ZERO {
        return Err(ProductError::InvalidPrice(price));
    }
    Ok(())
}

#[async_trait]
impl ActorEntity for Product {
    type Id = ProductId;
    type Create = ProductCreate;
    type Update = ProductUpdate;
    type Action = ();
    type ActionResult = ();
    type Error = ProductError;

    fn from_create_params(id: ProductId, params: ProductCreate) -> Result<Self, ProductError> {
        if params.name.trim().is_empty() {
            return Err(ProductError::ValidationError("name is required".into()));
        }
        validate_price(params.price)?;
        Ok(Self::new(id, params.name, params.price))
    }

    /// Handles updates to the Product entity.
    ///
    /// # Fields Updated
    /// - `name`: Product name
    /// - `price`: Catalog price for future orders
    async fn on_update(&mut self, update: ProductUpdate) -> Result<(), ProductError> {
        if let Some(price) = update.price {
            validate_price(price)?;
            self.price = price;
        }
        if let Some(name) = update.name {
            self.name = name;
        }
        Ok(())
    }

    async fn handle_action(&mut self, _action: ()) -> Result<(), ProductError> {
        Ok(())
    }
}
