use std::{collections::HashMap, fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use log::*;
use psp_common::Amount;
use tokio::sync::RwLock;

use crate::{
    db_types::{Order, OrderId, OrderStatusType, ProjectId},
    psp_api::{
        filter::{OrderQuery, Predicate},
        revenue_objects::{AccountingFacets, Refund, RevenueDynamicRequest, RevenueFacets},
    },
    traits::{OrderRepository, RepositoryError, RevenueReports},
};

const MEMORY_URL: &str = "memory://";

/// An order store that lives entirely in memory. Clones share the same tables.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    refunds: Arc<RwLock<Vec<Refund>>>,
}

impl Debug for InMemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InMemoryDatabase")
    }
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed orders of the request's merchant that the payment system closed within the request's range, as
    /// (close time, order) pairs.
    async fn settled_orders(&self, request: &RevenueDynamicRequest) -> Vec<(DateTime<Utc>, Order)> {
        let orders = self.orders.read().await;
        orders
            .values()
            .filter(|o| o.status == OrderStatusType::Complete && *o.merchant_id() == request.merchant_id)
            .filter_map(|o| o.payment_method_order_closed_at.map(|t| (t, o.clone())))
            .filter(|(t, _)| request.contains(t))
            .collect()
    }

    async fn merchant_refunds(&self, request: &RevenueDynamicRequest) -> Vec<Refund> {
        let refunds = self.refunds.read().await;
        refunds
            .iter()
            .filter(|r| r.merchant_id == request.merchant_id && request.contains(&r.created_at))
            .cloned()
            .collect()
    }
}

impl OrderRepository for InMemoryDatabase {
    fn url(&self) -> &str {
        MEMORY_URL
    }

    async fn fetch_order_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(id).cloned())
    }

    async fn fetch_order_by_project_order_id(
        &self,
        project: &ProjectId,
        project_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let order = orders
            .values()
            .find(|o| o.project.id == *project && o.project_order_id.as_deref() == Some(project_order_id))
            .cloned();
        Ok(order)
    }

    async fn insert_order(&self, order: Order) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(RepositoryError::OrderAlreadyExists(order.id));
        }
        orders.insert(order.id.clone(), order.clone());
        debug!("🗃️ Order {} saved", order.id);
        Ok(order)
    }

    async fn update_order(&self, mut order: Order) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().await;
        let stored = orders.get(&order.id).ok_or_else(|| RepositoryError::OrderNotFound(order.id.clone()))?;
        if stored.version != order.version {
            warn!(
                "🗃️ Order {} is at version {}, but the update was based on version {}",
                order.id, stored.version, order.version
            );
            return Err(RepositoryError::VersionConflict {
                id: order.id.clone(),
                expected: order.version,
                found: stored.version,
            });
        }
        order.version += 1;
        orders.insert(order.id.clone(), order.clone());
        trace!("🗃️ Order {} updated to version {}", order.id, order.version);
        Ok(order)
    }

    async fn count_orders(&self, predicate: &Predicate) -> Result<u64, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.values().filter(|o| predicate.matches(o)).count() as u64)
    }

    async fn search_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut result = orders.values().filter(|o| query.predicate.matches(o)).cloned().collect::<Vec<Order>>();
        result.sort_by(|a, b| query.compare(a, b));
        let page = result.into_iter().skip(query.offset as usize).take(query.limit as usize).collect();
        Ok(page)
    }
}

impl RevenueReports for InMemoryDatabase {
    async fn record_refund(&self, refund: Refund) -> Result<(), RepositoryError> {
        let mut refunds = self.refunds.write().await;
        debug!("🗃️ Refund of {} recorded against order {}", refund.amount, refund.order_id);
        refunds.push(refund);
        Ok(())
    }

    async fn fetch_revenue_facets(&self, request: &RevenueDynamicRequest) -> Result<RevenueFacets, RepositoryError> {
        let revenue = self
            .settled_orders(request)
            .await
            .into_iter()
            .map(|(t, o)| (t, o.amount_out_merchant_accounting_currency))
            .collect();
        let refunds = self.merchant_refunds(request).await.into_iter().map(|r| (r.created_at, r.amount)).collect();
        Ok(RevenueFacets::from_entries(request.period, revenue, refunds))
    }

    async fn fetch_accounting_facets(
        &self,
        request: &RevenueDynamicRequest,
    ) -> Result<AccountingFacets, RepositoryError> {
        let orders = self
            .settled_orders(request)
            .await
            .into_iter()
            .map(|(_, o)| {
                let commission = o.project_fee.as_ref().map(|f| f.merchant_amount()).unwrap_or_else(Amount::zero);
                (o.amount_out_merchant_accounting_currency, commission)
            })
            .collect::<Vec<_>>();
        let refunds = self.merchant_refunds(request).await;
        Ok(AccountingFacets::from_entries(&orders, &refunds))
    }
}
