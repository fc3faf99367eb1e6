use async_trait::async_trait;
use thiserror::Error;

use crate::{
    catalog_types::{Currency, PaymentMethod, Project},
    db_types::{PaymentMethodId, ProjectId},
};

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Catalog service is unavailable: {0}")]
    Unavailable(String),
}

/// Read access to merchant projects. A missing project is `Ok(None)`, not an error.
#[async_trait]
pub trait ProjectLookup: Send + Sync {
    async fn fetch_project(&self, id: &ProjectId) -> Result<Option<Project>, CatalogError>;
}

#[async_trait]
pub trait PaymentMethodLookup: Send + Sync {
    async fn fetch_payment_method(&self, id: &PaymentMethodId) -> Result<Option<PaymentMethod>, CatalogError>;
}

#[async_trait]
pub trait CurrencyLookup: Send + Sync {
    /// Fetch a currency by its ISO-4217 alphabetic code.
    async fn fetch_currency(&self, code_a3: &str) -> Result<Option<Currency>, CatalogError>;
}
