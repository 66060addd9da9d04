//! Demo: seeds a user and two products, places an order, cancels another, and shuts down.
//!
//! ```bash
//! RUST_LOG=info cargo run
//! ```

use order_lifecycle::config::Config;
use order_lifecycle::lifecycle::{setup_tracing, OrderSystem};
use order_lifecycle::model::{OrderLine, UserCreate};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{error, info, Instrument};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    setup_tracing();

    let config = Config::from_env()?;
    info!(?config, "Starting order lifecycle demo");

    let system = OrderSystem::new(config).await?;

    let user = async {
        info!("Creating test user");
        system
            .user_client
            .create_user(UserCreate {
                name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
            })
            .await
    }
    .instrument(tracing::info_span!("user_creation"))
    .await?;
    info!(user_id = %user.id, "User created successfully");

    let laptop = system.add_product("Laptop", Decimal::new(129999, 2), 10).await?;
    let mouse = system.add_product("Mouse", Decimal::new(2999, 2), 50).await?;

    let span = tracing::info_span!("order_processing");
    let placed = system
        .orchestrator
        .create_order(&user.id, vec![OrderLine::new(&laptop.id, 1), OrderLine::new(&mouse.id, 1)])
        .instrument(span)
        .await;
    match &placed {
        Ok(order) => info!(order_id = %order.id, total = %order.total_price, "Order processed successfully"),
        Err(e) => error!(error = %e, "Order processing failed"),
    }

    let span = tracing::info_span!("order_cancellation");
    let cancelled = async {
        let order = system
            .orchestrator
            .create_order(&user.id, vec![OrderLine::new(&mouse.id, 5)])
            .await?;
        system.orchestrator.cancel_order(&order.id, &user.id).await?;
        Ok::<_, order_lifecycle::orchestrator::OrderError>(order.id)
    }
    .instrument(span)
    .await;
    match cancelled {
        Ok(order_id) => info!(%order_id, "Order cancelled successfully"),
        Err(e) => error!(error = %e, "Order cancellation failed"),
    }

    let laptops_left = system.stock_client.level(&laptop.id).await?;
    let mice_left = system.stock_client.level(&mouse.id).await?;
    info!(laptops_left, mice_left, "Stock after demo");

    // Give the notification consumer a moment to drain the queue.
    tokio::time::sleep(Duration::from_millis(200)).await;

    system.shutdown().await?;
    info!("Application completed successfully");
    Ok(())
}
