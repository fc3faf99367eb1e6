use crate::{
    psp_api::revenue_objects::{AccountingFacets, Refund, RevenueDynamicRequest, RevenueFacets},
    traits::RepositoryError,
};

/// Pre-aggregation of stored data for reporting.
///
/// Backends produce facets only; merging revenue against refunds and extracting accounting groups is done by
/// [`crate::RevenueApi`].
#[allow(async_fn_in_trait)]
pub trait RevenueReports: Clone {
    /// Records a refund (or chargeback) against a completed order.
    async fn record_refund(&self, refund: Refund) -> Result<(), RepositoryError>;

    /// Revenue and refund points for the merchant, bucketed by the request's period, plus summaries.
    ///
    /// Revenue is counted for `Complete` orders by their payment-system close time, in the merchant's accounting
    /// currency. Refunds are counted by their creation time.
    async fn fetch_revenue_facets(&self, request: &RevenueDynamicRequest) -> Result<RevenueFacets, RepositoryError>;

    /// The accounting report groups for the merchant over the request's range.
    async fn fetch_accounting_facets(
        &self,
        request: &RevenueDynamicRequest,
    ) -> Result<AccountingFacets, RepositoryError>;
}
