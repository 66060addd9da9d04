//! # Order Lifecycle
//!
//! > **Checkout to notification, one actor at a time.**
//!
//! This crate turns a checkout request into a persisted order, a consistent stock
//! adjustment and an asynchronously delivered event that downstream consumers act on.
//! Every stateful component is a Tokio actor built from one generic recipe.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Resources + Actors
//!
//! Stock rows, orders, outbox entries and notification records are all *resources*
//! with standard CRUD operations plus resource-specific actions, and each table is
//! owned by one actor task:
//! - **No locks**: an actor handles one request at a time, so a read-check-write
//!   inside an action cannot interleave with another request.
//! - **Type Safety**: each actor only accepts its own payloads and actions.
//!
//! ### Compensation instead of transactions
//!
//! A checkout touches the order store and several stock rows. Nothing spans them; if
//! reserving item *n* fails, items *1..n-1* are released again and the order is
//! cancelled. See [`orchestrator`].
//!
//! ### At-least-once events
//!
//! Events are published fire-and-forget and tracked in an outbox so lost ones can be
//! republished. Consumers acknowledge, requeue or reject each delivery and must
//! tolerate duplicates. See [`event_channel`].
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Engine ([`framework`])
//! The generic [`ResourceActor`](framework::ResourceActor) and the
//! [`ActorEntity`](framework::ActorEntity) trait, plus [`framework::mock`] for testing
//! clients without spawning actors.
//!
//! ### 2. The Resources ([`stock_actor`], [`order_actor`], [`user_actor`], [`product_actor`])
//! Concrete `ActorEntity` implementations over the plain data in [`model`].
//!
//! ### 3. The Interface ([`clients`])
//! Typed wrappers such as [`StockClient`](clients::StockClient), plus the
//! [`IdentityProvider`](clients::IdentityProvider) and [`Catalog`](clients::Catalog)
//! collaborator traits.
//!
//! ### 4. The Flow ([`orchestrator`], [`event_channel`], [`notification`])
//! [`OrderOrchestrator`](orchestrator::OrderOrchestrator) drives checkout and
//! cancellation; the event channel carries the results to the notification handler.
//!
//! ### 5. The Runtime ([`lifecycle`], [`config`])
//! [`OrderSystem`](lifecycle::OrderSystem) starts and stops everything, configured by
//! [`Config`](config::Config).
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! RUST_LOG=info cargo run
//! cargo test
//! ```

pub mod clients;
pub mod config;
pub mod event_channel;
pub mod framework;
pub mod lifecycle;
pub mod model;
pub mod notification;
pub mod orchestrator;
pub mod order_actor;
pub mod product_actor;
pub mod stock_actor;
pub mod user_actor;
