//! In-memory backends and collaborators.
//!
//! Everything in this module keeps its state in `Arc<RwLock<..>>` tables, so clones share the same data. They are
//! meant for tests, demos and small deployments where the reference data is loaded at start-up.
//!
//! * [`InMemoryDatabase`] implements the storage traits, [`crate::traits::OrderRepository`] and
//!   [`crate::traits::RevenueReports`].
//! * [`InMemoryCatalog`] serves projects, payment methods and currencies.
//! * [`RateTable`] stores exchange rates and converts with them.
//! * [`CommissionTable`] and [`VatTable`] compute fees from percentage tables.
//! * [`StaticGeoLocator`] resolves a fixed set of IP addresses.
//! * [`PaymentHandlerRegistry`] selects payment handlers by name.
mod catalog;
mod database;
mod fees;
mod geo;
mod handlers;
mod rates;

pub use catalog::InMemoryCatalog;
pub use database::InMemoryDatabase;
pub use fees::{CommissionRates, CommissionTable, VatTable};
pub use geo::StaticGeoLocator;
pub use handlers::PaymentHandlerRegistry;
pub use rates::RateTable;
