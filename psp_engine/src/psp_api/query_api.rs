use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{OrderId, ProjectId},
    psp_api::{
        errors::QueryApiError,
        filter::{build_predicate, parse_sort, OrderQuery, QueryEnvelope},
        order_view::OrderView,
    },
    traits::OrderRepository,
};

/// One page of a query result, plus the total number of matching orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPage {
    pub count: u64,
    pub items: Vec<OrderView>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Sort tokens, e.g. `-created_at`
    pub sort: Vec<String>,
    pub limit: Option<u64>,
    pub offset: u64,
}

impl PageRequest {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { sort: Vec::new(), limit: Some(limit), offset }
    }

    pub fn sorted_by(mut self, token: &str) -> Self {
        self.sort.push(token.to_string());
        self
    }
}

/// Read-only access to orders for merchant dashboards.
pub struct OrderQueryApi<B> {
    db: B,
}

impl<B> Debug for OrderQueryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderQueryApi")
    }
}

impl<B> OrderQueryApi<B>
where B: OrderRepository
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Finds the orders of the `accessible` projects that match `envelope`.
    pub async fn find_orders(
        &self,
        envelope: &QueryEnvelope,
        accessible: &[ProjectId],
        page: &PageRequest,
    ) -> Result<OrderPage, QueryApiError> {
        let predicate = build_predicate(envelope, accessible);
        let mut query = OrderQuery::new(predicate).with_sort(parse_sort(page.sort.as_slice())).with_offset(page.offset);
        if let Some(limit) = page.limit {
            query = query.with_limit(limit);
        }
        let count = self.db.count_orders(&query.predicate).await.map_err(|e| {
            error!("🔎️ Could not count orders. {e}");
            e
        })?;
        let orders = self.db.search_orders(&query).await.map_err(|e| {
            error!("🔎️ Could not fetch orders. {e}");
            e
        })?;
        trace!("🔎️ {count} orders match. Returning {} from offset {}", orders.len(), query.offset);
        Ok(OrderPage { count, items: orders.iter().map(OrderView::from).collect() })
    }

    pub async fn fetch_order_view(&self, id: &OrderId) -> Result<Option<OrderView>, QueryApiError> {
        let order = self.db.fetch_order_by_id(id).await?;
        Ok(order.as_ref().map(OrderView::from))
    }
}
