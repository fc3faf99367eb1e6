//! PSP Order Engine
//!
//! The order engine is the core of the PSP payment orchestration platform. It turns merchant order requests and
//! payment-system callbacks into fully priced, fee-allocated orders, and drives those orders through their settlement
//! lifecycle. It is transport-agnostic: the HTTP layer lives elsewhere and calls into the APIs exported here.
//!
//! The library is divided into three main sections:
//! 1. Storage. Backends implement the traits in [`mod@traits`]. An in-memory backend lives in [`mod@memory`], and a
//!    SQLite backend ([`SqliteDatabase`]) is available behind the `sqlite` feature. The persisted data types are defined
//!    in [`mod@db_types`] and are public.
//! 2. Collaborators. Reference data, exchange rates, fees, geo-location, payment systems and the message broker are
//!    external services, injected through [`Collaborators`]. The [`mod@memory`] module has simple table-driven
//!    implementations of each of them.
//! 3. The public API. [`OrderFlowApi`] handles order intake, payment creation and payment notifications.
//!    [`OrderQueryApi`] and [`RevenueApi`] are the read paths used by merchant dashboards.
//!
//! The engine also emits in-process events when orders are created or finalized. See [`mod@events`] for how to hook
//! into them.
pub mod catalog_types;
pub mod config;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod memory;
mod psp_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use config::EngineConfig;
pub use psp_api::{
    collaborators::Collaborators,
    errors::{OrderFlowError, QueryApiError, SystemError, ValidationError, OPAQUE_SYSTEM_MESSAGE},
    exchange_objects,
    filter,
    order_flow_api::OrderFlowApi,
    order_objects,
    order_view,
    query_api::{OrderPage, OrderQueryApi, PageRequest},
    revenue_api::RevenueApi,
    revenue_objects,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
