//! `SqliteDatabase` is a concrete storage backend for the PSP order engine.
//!
//! It implements the storage traits defined in the [`crate::traits`] module on top of a SQLite connection pool.
//! Orders are stored as JSON documents, alongside copies of the attributes that order queries filter and sort on.
use std::fmt::Debug;

use async_trait::async_trait;
use log::*;
use psp_common::Amount;
use rust_decimal::Decimal;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{exchange_rates, new_pool, orders, refunds};
use crate::{
    db_types::{Order, OrderId, ProjectId},
    psp_api::{
        exchange_objects::ExchangeRate,
        filter::{OrderQuery, Predicate},
        revenue_objects::{AccountingFacets, Refund, RevenueDynamicRequest, RevenueFacets},
    },
    traits::{ExchangeRateError, ExchangeRateStore, ExchangeRates, OrderRepository, RepositoryError, RevenueReports},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects to the database at `url`. The schema is not touched; call [`SqliteDatabase::migrate`] for that.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        info!("🗃️ Connected to order database at {url}");
        Ok(Self { url: url.to_string(), pool })
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn settled_orders(&self, request: &RevenueDynamicRequest) -> Result<Vec<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_settled_orders(request, &mut conn).await
    }

    async fn merchant_refunds(&self, request: &RevenueDynamicRequest) -> Result<Vec<Refund>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        refunds::fetch_refunds(request, &mut conn).await
    }
}

impl OrderRepository for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_order_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_id(id, &mut conn).await
    }

    async fn fetch_order_by_project_order_id(
        &self,
        project: &ProjectId,
        project_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_project_order_id(project, project_order_id, &mut conn).await
    }

    async fn insert_order(&self, order: Order) -> Result<Order, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_order(&order, &mut conn).await?;
        debug!("🗃️ Order {} saved", order.id);
        Ok(order)
    }

    async fn update_order(&self, mut order: Order) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        if orders::update_order_if_version(&order, &mut *tx).await? == 0 {
            let found = orders::fetch_version(&order.id, &mut *tx).await?;
            tx.rollback().await?;
            return match found {
                None => Err(RepositoryError::OrderNotFound(order.id)),
                Some(found) => {
                    warn!(
                        "🗃️ Order {} is at version {found}, but the update was based on version {}",
                        order.id, order.version
                    );
                    Err(RepositoryError::VersionConflict { id: order.id, expected: order.version, found })
                },
            };
        }
        tx.commit().await?;
        order.version += 1;
        trace!("🗃️ Order {} updated to version {}", order.id, order.version);
        Ok(order)
    }

    async fn count_orders(&self, predicate: &Predicate) -> Result<u64, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        orders::count_orders(predicate, &mut conn).await
    }

    async fn search_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        orders::search_orders(query, &mut conn).await
    }
}

impl RevenueReports for SqliteDatabase {
    async fn record_refund(&self, refund: Refund) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        refunds::insert_refund(&refund, &mut conn).await?;
        debug!("🗃️ Refund of {} recorded against order {}", refund.amount, refund.order_id);
        Ok(())
    }

    async fn fetch_revenue_facets(&self, request: &RevenueDynamicRequest) -> Result<RevenueFacets, RepositoryError> {
        let revenue = self
            .settled_orders(request)
            .await?
            .into_iter()
            .filter_map(|o| o.payment_method_order_closed_at.map(|t| (t, o.amount_out_merchant_accounting_currency)))
            .collect();
        let refunds = self.merchant_refunds(request).await?.into_iter().map(|r| (r.created_at, r.amount)).collect();
        Ok(RevenueFacets::from_entries(request.period, revenue, refunds))
    }

    async fn fetch_accounting_facets(
        &self,
        request: &RevenueDynamicRequest,
    ) -> Result<AccountingFacets, RepositoryError> {
        let orders = self
            .settled_orders(request)
            .await?
            .into_iter()
            .map(|o| {
                let commission = o.project_fee.as_ref().map(|f| f.merchant_amount()).unwrap_or_else(Amount::zero);
                (o.amount_out_merchant_accounting_currency, commission)
            })
            .collect::<Vec<_>>();
        let refunds = self.merchant_refunds(request).await?;
        Ok(AccountingFacets::from_entries(&orders, &refunds))
    }
}

impl ExchangeRateStore for SqliteDatabase {
    async fn fetch_last_rate(&self, base: &str, quote: &str) -> Result<ExchangeRate, ExchangeRateError> {
        let mut conn = self.pool.acquire().await.map_err(|e| ExchangeRateError::DatabaseError(e.to_string()))?;
        exchange_rates::fetch_last_rate(base, quote, &mut conn).await
    }

    async fn set_exchange_rate(&self, rate: &ExchangeRate) -> Result<(), ExchangeRateError> {
        if rate.rate <= Decimal::ZERO {
            return Err(ExchangeRateError::InvalidRate(rate.to_string()));
        }
        let mut conn = self.pool.acquire().await.map_err(|e| ExchangeRateError::DatabaseError(e.to_string()))?;
        exchange_rates::set_exchange_rate(rate, &mut conn).await?;
        debug!("💱️ Exchange rate set: {rate}");
        Ok(())
    }
}

#[async_trait]
impl ExchangeRates for SqliteDatabase {
    async fn convert(&self, from: &str, to: &str, amount: Amount) -> Result<Amount, ExchangeRateError> {
        ExchangeRate::convert_with(self, from, to, amount).await
    }
}
