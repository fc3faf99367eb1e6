//! # PSP engine public API
//!
//! The `psp_api` module exposes the programmatic API of the order-processing engine. Like the storage layer, the API
//! is split up by concern, so that a host can wire up only the parts it needs.
//!
//! * [`order_flow_api`] creates orders from merchant requests, creates payments for them and settles them in response
//!   to payment-system notifications.
//! * [`query_api`] finds orders for merchant dashboards and projects them into [`order_view::OrderView`]s.
//! * [`revenue_api`] builds net revenue and accounting reports.
//!
//! The other submodules hold the request and response types, and the building blocks the flows are made of: the
//! intake validator, the fee engine and the status guards.
//!
//! # API usage
//!
//! Every API is created by supplying a storage backend that implements the backend traits it needs. The order flow
//! additionally takes its external collaborators explicitly.
//!
//! ```rust,ignore
//! use psp_engine::{Collaborators, EngineConfig, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(&config.database_url, config.db_max_connections).await?;
//! let api = OrderFlowApi::new(db, collaborators, config, producers);
//! let order = api.process_new_order(request).await?;
//! ```
pub mod collaborators;
pub mod errors;
pub mod exchange_objects;
pub mod fee_engine;
pub mod filter;
pub mod intake;
pub mod order_flow_api;
pub mod order_objects;
pub mod order_view;
pub mod query_api;
pub mod revenue_api;
pub mod revenue_objects;
pub mod state_machine;
