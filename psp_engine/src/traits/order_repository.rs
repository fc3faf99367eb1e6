use thiserror::Error;

use crate::{
    db_types::{Order, OrderId, ProjectId},
    psp_api::filter::{OrderQuery, Predicate},
};

#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} already exists")]
    OrderAlreadyExists(OrderId),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {id} was modified concurrently. Expected version {expected}, but found {found}")]
    VersionConflict { id: OrderId, expected: i64, found: i64 },
    #[error("Could not (de)serialize order document: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        RepositoryError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(e: serde_json::Error) -> Self {
        RepositoryError::SerializationError(e.to_string())
    }
}

/// Storage for the [`Order`] aggregate.
///
/// Orders are never deleted through this interface.
#[allow(async_fn_in_trait)]
pub trait OrderRepository: Clone {
    /// The URL of the backing store
    fn url(&self) -> &str;

    async fn fetch_order_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Fetches the order a project submitted under its own order id. Matching is exact.
    async fn fetch_order_by_project_order_id(
        &self,
        project: &ProjectId,
        project_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Stores a brand-new order. Fails with [`RepositoryError::OrderAlreadyExists`] if the id is taken.
    async fn insert_order(&self, order: Order) -> Result<Order, RepositoryError>;

    /// Replaces the stored order with `order`.
    ///
    /// `order.version` must equal the stored version, otherwise [`RepositoryError::VersionConflict`] is returned and
    /// nothing is written. On success the stored version is incremented and the stored order is returned.
    async fn update_order(&self, order: Order) -> Result<Order, RepositoryError>;

    async fn count_orders(&self, predicate: &Predicate) -> Result<u64, RepositoryError>;

    /// Fetches a page of orders matching the query, in the requested sort order.
    async fn search_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, RepositoryError>;
}
