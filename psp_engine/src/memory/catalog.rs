use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use log::*;
use tokio::sync::RwLock;

use crate::{
    catalog_types::{Currency, PaymentMethod, Project},
    db_types::{PaymentMethodId, ProjectId},
    traits::{CatalogError, CurrencyLookup, PaymentMethodLookup, ProjectLookup},
};

/// Projects, payment methods and currencies, held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    projects: Arc<RwLock<HashMap<ProjectId, Project>>>,
    payment_methods: Arc<RwLock<HashMap<PaymentMethodId, PaymentMethod>>>,
    currencies: Arc<RwLock<HashMap<String, Currency>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a project.
    pub async fn insert_project(&self, project: Project) {
        trace!("🗃️ Project {} added to catalog", project.id);
        self.projects.write().await.insert(project.id.clone(), project);
    }

    pub async fn insert_payment_method(&self, method: PaymentMethod) {
        trace!("🗃️ Payment method {} added to catalog", method.id);
        self.payment_methods.write().await.insert(method.id.clone(), method);
    }

    pub async fn insert_currency(&self, currency: Currency) {
        self.currencies.write().await.insert(currency.code_a3.to_ascii_uppercase(), currency);
    }
}

#[async_trait]
impl ProjectLookup for InMemoryCatalog {
    async fn fetch_project(&self, id: &ProjectId) -> Result<Option<Project>, CatalogError> {
        Ok(self.projects.read().await.get(id).cloned())
    }
}

#[async_trait]
impl PaymentMethodLookup for InMemoryCatalog {
    async fn fetch_payment_method(&self, id: &PaymentMethodId) -> Result<Option<PaymentMethod>, CatalogError> {
        Ok(self.payment_methods.read().await.get(id).cloned())
    }
}

#[async_trait]
impl CurrencyLookup for InMemoryCatalog {
    async fn fetch_currency(&self, code_a3: &str) -> Result<Option<Currency>, CatalogError> {
        let currencies = self.currencies.read().await;
        Ok(currencies.get(&code_a3.to_ascii_uppercase()).cloned())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn currency_codes_are_case_insensitive() {
        let catalog = InMemoryCatalog::new();
        catalog.insert_currency(Currency::new(643, "RUB", "Russian ruble")).await;
        assert_eq!(catalog.fetch_currency("rub").await.unwrap().unwrap().code_int, 643);
        assert!(catalog.fetch_currency("XXX").await.unwrap().is_none());
        assert!(catalog.fetch_project(&"p1".into()).await.unwrap().is_none());
    }
}
