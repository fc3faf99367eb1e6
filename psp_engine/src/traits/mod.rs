//! # Backend and collaborator contracts
//!
//! This module defines the interface contracts the engine relies on. None of them carry business logic; the engine's
//! flows in [`crate::OrderFlowApi`] are written purely against these traits.
//!
//! ## Storage backends
//! Storage backends are plugged in as a type parameter, in the same way for every API type.
//! * [`OrderRepository`] stores and retrieves orders, with an optimistic version check on update.
//! * [`RevenueReports`] aggregates stored orders and refunds into revenue and accounting facets.
//!
//! ## Collaborators
//! Collaborators are external services. They are injected as trait objects via [`crate::Collaborators`], so that any
//! of them can be swapped out in tests.
//! * [`ProjectLookup`], [`PaymentMethodLookup`] and [`CurrencyLookup`] read reference data.
//! * [`ExchangeRates`] converts amounts between currencies.
//! * [`CommissionCalculator`] and [`VatCalculator`] compute fees and taxes.
//! * [`GeoLocator`] resolves a payer's location from an IP address.
//! * [`PaymentHandlerFactory`] selects the [`PaymentSystemHandler`] for an order.
//! * [`MessageBroker`] publishes integration events.
mod catalog;
mod exchange_rates;
mod fees;
mod geo;
mod message_broker;
mod order_repository;
mod payment_system;
mod revenue_reports;

pub use catalog::{CatalogError, CurrencyLookup, PaymentMethodLookup, ProjectLookup};
pub use exchange_rates::{ExchangeRateError, ExchangeRateStore, ExchangeRates};
pub use fees::{CommissionCalculator, CommissionError, CommissionSplit, VatCalculator, VatError};
pub use geo::{GeoError, GeoLocator, GeoRecord};
pub use message_broker::{BrokerError, MessageBroker, MessageHeaders, RETRY_COUNT_HEADER};
pub use order_repository::{OrderRepository, RepositoryError};
pub use payment_system::{
    PaymentHandlerError,
    PaymentHandlerFactory,
    PaymentResponse,
    PaymentStatus,
    PaymentSystemHandler,
    ProviderSettings,
};
pub use revenue_reports::RevenueReports;
