//! Net revenue and accounting reports for merchants.
use std::{collections::HashMap, fmt::Debug};

use log::*;
use psp_common::Amount;

use crate::{
    psp_api::{
        errors::QueryApiError,
        revenue_objects::{
            AccountingFacets,
            AccountingPayment,
            RevenueDynamicRequest,
            RevenueDynamicResult,
            RevenueFacets,
            RevenuePoint,
            RevenuePointDate,
            GROUP_CHARGEBACK,
            GROUP_COMMISSION,
            GROUP_REFUND,
            GROUP_SUCCESS,
            GROUP_TOTAL_SUCCESS,
        },
    },
    traits::RevenueReports,
};

pub struct RevenueApi<B> {
    db: B,
}

impl<B> Debug for RevenueApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RevenueApi")
    }
}

impl<B> RevenueApi<B>
where B: RevenueReports
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Net revenue for the merchant, bucketed by the request's period.
    pub async fn revenue_dynamic(&self, request: &RevenueDynamicRequest) -> Result<RevenueDynamicResult, QueryApiError> {
        let facets = self.db.fetch_revenue_facets(request).await?;
        debug!(
            "📈️ {} revenue points and {} refund points for merchant {} between {} and {}",
            facets.revenue_points.len(),
            facets.refund_points.len(),
            request.merchant_id,
            request.from,
            request.to
        );
        Ok(merge_revenue_facets(facets))
    }

    pub async fn accounting_payment(&self, request: &RevenueDynamicRequest) -> Result<AccountingPayment, QueryApiError> {
        let facets = self.db.fetch_accounting_facets(request).await?;
        Ok(extract_accounting_payment(&facets))
    }
}

/// Nets each revenue bucket against the refund bucket with the same date key.
///
/// Revenue buckets without a matching refund are reported gross. Refund buckets without a matching revenue bucket are
/// dropped.
pub fn merge_revenue_facets(facets: RevenueFacets) -> RevenueDynamicResult {
    let refunds = facets.refund_points.iter().map(|p| (p.date, p.total)).collect::<HashMap<RevenuePointDate, Amount>>();
    let points = facets
        .revenue_points
        .into_iter()
        .map(|p| {
            let amount = match refunds.get(&p.date) {
                Some(refund) => p.total - *refund,
                None => p.total,
            };
            RevenuePoint { date: p.date, amount }
        })
        .collect();
    RevenueDynamicResult {
        points,
        revenue: facets.revenue.unwrap_or_default(),
        refund: facets.refund.unwrap_or_default(),
    }
}

/// Reads the five accounting groups. Absent groups read as zero.
pub fn extract_accounting_payment(facets: &AccountingFacets) -> AccountingPayment {
    let total = |group: &str| facets.group(group).and_then(|g| g.first()).map(|s| s.total).unwrap_or_default();
    AccountingPayment {
        success_with_commissions: total(GROUP_TOTAL_SUCCESS),
        success_without_commissions: total(GROUP_SUCCESS),
        total_refund: total(GROUP_REFUND),
        total_chargeback: total(GROUP_CHARGEBACK),
        total_commission: total(GROUP_COMMISSION),
    }
}
