//! # Observability & Tracing
//!
//! [`setup_tracing`] initializes structured logging with the `tracing` crate. Client
//! calls and orchestrator entry points are `#[instrument]`ed, so each log line carries
//! the span path of the request that produced it.
//!
//! ## Configuration
//!
//! Verbosity comes from `RUST_LOG`. The output is compact and hides the module prefix
//! (`with_target(false)`).
//!
//! ```bash
//! # Outcomes only
//! RUST_LOG=info cargo run
//!
//! # Full payloads at entry points
//! RUST_LOG=debug cargo run
//!
//! # One component
//! RUST_LOG=order_lifecycle::event_channel=debug cargo run
//! ```
//!
//! ## Debug Payloads
//!
//! Entry points log their full input **once**, at `debug`:
//!
//! ```rust,ignore
//! debug!(?lines, "create_order called");
//! ```
//!
//! ## Checkout Trace
//!
//! **With `RUST_LOG=info`**:
//!
//! ```text
//! INFO create_order: Order stored order_id=6f1c...
//! INFO create_order: Order pending order_id=6f1c... total_price=1329.98
//! INFO create_order: Order confirmed order_id=6f1c...
//! INFO publish: Event published entry_id=0b7e... routed=1
//! INFO handle: Notification sent user_id="user_1" subject="Order Confirmation"
//! ```
//!
//! A failed reservation shows up as a `warn!` naming the product, followed by the
//! compensating releases at `debug`. A release that fails is an `error!` carrying
//! `order_id`, `product_id` and `quantity`; those lines need manual reconciliation.

/// Installs the global subscriber. Call once, at startup.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
