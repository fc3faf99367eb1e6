use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use chrono::{DateTime, Datelike, Timelike, Utc};
use psp_common::Amount;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db_types::{MerchantId, OrderId},
    helpers::{day_end, day_start},
};

pub const GROUP_TOTAL_SUCCESS: &str = "total_success";
pub const GROUP_SUCCESS: &str = "success";
pub const GROUP_REFUND: &str = "refund";
pub const GROUP_CHARGEBACK: &str = "chargeback";
pub const GROUP_COMMISSION: &str = "commission";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevenuePeriod {
    Year,
    Month,
    Week,
    Day,
    Hour,
}

#[derive(Debug, Clone, Error)]
#[error("Unknown revenue period: {0}")]
pub struct UnknownPeriod(String);

impl FromStr for RevenuePeriod {
    type Err = UnknownPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "year" => Ok(Self::Year),
            "month" => Ok(Self::Month),
            "week" => Ok(Self::Week),
            "day" => Ok(Self::Day),
            "hour" => Ok(Self::Hour),
            _ => Err(UnknownPeriod(s.to_string())),
        }
    }
}

/// A request for a merchant's revenue over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueDynamicRequest {
    pub merchant_id: MerchantId,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub period: RevenuePeriod,
}

impl RevenueDynamicRequest {
    /// Creates a request covering whole days: `from` is moved to the start of its day and `to` to the end of its day.
    pub fn new(merchant_id: MerchantId, from: DateTime<Utc>, to: DateTime<Utc>, period: RevenuePeriod) -> Self {
        Self { merchant_id, from: day_start(from), to: day_end(to), period }
    }

    pub fn contains(&self, t: &DateTime<Utc>) -> bool {
        self.from <= *t && *t <= self.to
    }
}

/// The composite date key of a revenue bucket. Only the components at or above the request's period are set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RevenuePointDate {
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
}

impl RevenuePointDate {
    pub fn year(year: i32) -> Self {
        Self { year, ..Default::default() }
    }

    /// The bucket that `t` falls into for the given period. Weekly buckets use ISO weeks.
    pub fn for_period(period: RevenuePeriod, t: &DateTime<Utc>) -> Self {
        match period {
            RevenuePeriod::Year => Self::year(t.year()),
            RevenuePeriod::Month => Self { month: Some(t.month()), ..Self::year(t.year()) },
            RevenuePeriod::Week => {
                let week = t.iso_week();
                Self { week: Some(week.week()), ..Self::year(week.year()) }
            },
            RevenuePeriod::Day => Self { month: Some(t.month()), day: Some(t.day()), ..Self::year(t.year()) },
            RevenuePeriod::Hour => {
                Self { month: Some(t.month()), day: Some(t.day()), hour: Some(t.hour()), ..Self::year(t.year()) }
            },
        }
    }
}

impl Display for RevenuePointDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.year)?;
        if let Some(m) = self.month {
            write!(f, "-{m:02}")?;
        }
        if let Some(w) = self.week {
            write!(f, "-W{w:02}")?;
        }
        if let Some(d) = self.day {
            write!(f, "-{d:02}")?;
        }
        if let Some(h) = self.hour {
            write!(f, "T{h:02}")?;
        }
        Ok(())
    }
}

/// A pre-aggregated bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetPoint {
    pub date: RevenuePointDate,
    pub total: Amount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetSummary {
    pub count: u64,
    pub total: Amount,
    pub avg: Amount,
}

impl FacetSummary {
    pub fn from_amounts<I: IntoIterator<Item = Amount>>(amounts: I) -> Self {
        let (count, total) = amounts.into_iter().fold((0u64, Amount::zero()), |(n, t), a| (n + 1, t + a));
        let avg = total.checked_div(Decimal::from(count)).unwrap_or_default();
        Self { count, total, avg }
    }
}

fn bucket<I: IntoIterator<Item = (DateTime<Utc>, Amount)>>(period: RevenuePeriod, entries: I) -> Vec<FacetPoint> {
    let mut buckets = BTreeMap::<RevenuePointDate, Amount>::new();
    for (t, amount) in entries {
        *buckets.entry(RevenuePointDate::for_period(period, &t)).or_default() += amount;
    }
    buckets.into_iter().map(|(date, total)| FacetPoint { date, total }).collect()
}

/// The raw material for a revenue report, as produced by a storage backend.
///
/// The summaries are optional: a backend that found no data for a group leaves it out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueFacets {
    pub revenue_points: Vec<FacetPoint>,
    pub refund_points: Vec<FacetPoint>,
    pub revenue: Option<FacetSummary>,
    pub refund: Option<FacetSummary>,
}

impl RevenueFacets {
    /// Buckets individual revenue and refund entries (timestamp, amount) by `period`.
    pub fn from_entries(
        period: RevenuePeriod,
        revenue: Vec<(DateTime<Utc>, Amount)>,
        refunds: Vec<(DateTime<Utc>, Amount)>,
    ) -> Self {
        let summary = |entries: &[(DateTime<Utc>, Amount)]| {
            (!entries.is_empty()).then(|| FacetSummary::from_amounts(entries.iter().map(|(_, a)| *a)))
        };
        Self {
            revenue: summary(&revenue),
            refund: summary(&refunds),
            revenue_points: bucket(period, revenue),
            refund_points: bucket(period, refunds),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenuePoint {
    pub date: RevenuePointDate,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueDynamicResult {
    pub points: Vec<RevenuePoint>,
    pub revenue: FacetSummary,
    pub refund: FacetSummary,
}

/// Named accounting groups, each holding the summaries a backend computed for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountingFacets(BTreeMap<String, Vec<FacetSummary>>);

impl AccountingFacets {
    pub fn with_group(mut self, name: &str, summary: FacetSummary) -> Self {
        self.0.entry(name.to_string()).or_default().push(summary);
        self
    }

    pub fn group(&self, name: &str) -> Option<&[FacetSummary]> {
        self.0.get(name).map(Vec::as_slice)
    }

    /// Computes the standard groups from completed orders, given as (gross amount, commission) pairs in the merchant's
    /// accounting currency, and the merchant's refunds. Groups with no entries are left out.
    pub fn from_entries(orders: &[(Amount, Amount)], refunds: &[Refund]) -> Self {
        let mut facets = Self::default();
        let mut add = |name: &str, amounts: Vec<Amount>| {
            if !amounts.is_empty() {
                facets.0.entry(name.to_string()).or_default().push(FacetSummary::from_amounts(amounts));
            }
        };
        add(GROUP_TOTAL_SUCCESS, orders.iter().map(|(gross, _)| *gross).collect());
        add(GROUP_SUCCESS, orders.iter().map(|(gross, fee)| *gross - *fee).collect());
        add(GROUP_COMMISSION, orders.iter().map(|(_, fee)| *fee).collect());
        add(GROUP_REFUND, refunds.iter().filter(|r| !r.is_chargeback).map(|r| r.amount).collect());
        add(GROUP_CHARGEBACK, refunds.iter().filter(|r| r.is_chargeback).map(|r| r.amount).collect());
        facets
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingPayment {
    pub success_with_commissions: Amount,
    pub success_without_commissions: Amount,
    pub total_refund: Amount,
    pub total_chargeback: Amount,
    pub total_commission: Amount,
}

/// A refund, or chargeback, against a completed order. The amount is in the merchant's accounting currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub order_id: OrderId,
    pub merchant_id: MerchantId,
    pub amount: Amount,
    pub is_chargeback: bool,
    pub created_at: DateTime<Utc>,
}

impl Refund {
    pub fn new(order_id: OrderId, merchant_id: MerchantId, amount: Amount) -> Self {
        Self { order_id, merchant_id, amount, is_chargeback: false, created_at: Utc::now() }
    }

    pub fn as_chargeback(mut self) -> Self {
        self.is_chargeback = true;
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn point_dates() {
        let t = Utc.with_ymd_and_hms(2024, 3, 14, 15, 9, 26).unwrap();
        assert_eq!(RevenuePointDate::for_period(RevenuePeriod::Year, &t).to_string(), "2024");
        assert_eq!(RevenuePointDate::for_period(RevenuePeriod::Month, &t).to_string(), "2024-03");
        assert_eq!(RevenuePointDate::for_period(RevenuePeriod::Week, &t).to_string(), "2024-W11");
        assert_eq!(RevenuePointDate::for_period(RevenuePeriod::Day, &t).to_string(), "2024-03-14");
        assert_eq!(RevenuePointDate::for_period(RevenuePeriod::Hour, &t).to_string(), "2024-03-14T15");
        assert_eq!("Week".parse::<RevenuePeriod>().unwrap(), RevenuePeriod::Week);
        assert!("fortnight".parse::<RevenuePeriod>().is_err());
    }

    #[test]
    fn request_covers_whole_days() {
        let from = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap();
        let req = RevenueDynamicRequest::new("m1".into(), from, to, RevenuePeriod::Day);
        assert!(req.contains(&Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()));
        assert!(req.contains(&Utc.with_ymd_and_hms(2024, 3, 2, 23, 59, 59).unwrap()));
        assert!(!req.contains(&Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap()));
    }

    #[test]
    fn facets_from_entries() {
        let d1 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let d2 = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap();
        let facets = RevenueFacets::from_entries(
            RevenuePeriod::Day,
            vec![(d1, Amount::from(100)), (d1, Amount::from(50)), (d2, Amount::from(25))],
            vec![],
        );
        assert_eq!(facets.revenue_points.len(), 2);
        assert_eq!(facets.revenue_points[0].total, Amount::from(150));
        assert_eq!(facets.revenue, Some(FacetSummary {
            count: 3,
            total: Amount::from(175),
            avg: Amount::new(dec!(58.33))
        }));
        assert!(facets.refund.is_none());
        assert!(facets.refund_points.is_empty());
    }

    #[test]
    fn accounting_groups() {
        let orders = [(Amount::from(100), Amount::from(4)), (Amount::from(50), Amount::from(2))];
        let refunds = [
            Refund::new("o1".into(), "m1".into(), Amount::from(10)),
            Refund::new("o2".into(), "m1".into(), Amount::from(7)).as_chargeback(),
        ];
        let facets = AccountingFacets::from_entries(&orders, &refunds);
        assert_eq!(facets.group(GROUP_TOTAL_SUCCESS).unwrap()[0].total, Amount::from(150));
        assert_eq!(facets.group(GROUP_SUCCESS).unwrap()[0].total, Amount::from(144));
        assert_eq!(facets.group(GROUP_COMMISSION).unwrap()[0].total, Amount::from(6));
        assert_eq!(facets.group(GROUP_REFUND).unwrap()[0].total, Amount::from(10));
        assert_eq!(facets.group(GROUP_CHARGEBACK).unwrap()[0].total, Amount::from(7));
        assert!(AccountingFacets::from_entries(&[], &[]).group(GROUP_REFUND).is_none());
    }
}
