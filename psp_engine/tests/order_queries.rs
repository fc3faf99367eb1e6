use chrono::{Duration, TimeZone, Utc};
use psp_common::Amount;
use psp_engine::{
    db_types::{Order, OrderStatusType, ProjectId},
    filter::{
        QueryEnvelope,
        KEY_ACCOUNT,
        KEY_COUNTRIES,
        KEY_ID,
        KEY_PAYMENT_METHODS,
        KEY_PM_DATE_FROM,
        KEY_PROJECT_DATE_FROM,
        KEY_PROJECT_DATE_TO,
        KEY_QUICK_FILTER,
        KEY_STATUSES,
    },
    memory::InMemoryDatabase,
    revenue_objects::{RevenueDynamicRequest, RevenuePeriod, RevenuePointDate, Refund},
    traits::{OrderRepository, RevenueReports},
    OrderQueryApi,
    PageRequest,
    RevenueApi,
};
use rust_decimal_macros::dec;

use crate::support::{
    fixtures::{ip, order_request, TestSystem, CARD_METHOD, MERCHANT_ID, PROJECT_ID},
    prepare_env::init_logging,
};

mod support;

async fn setup() -> TestSystem<InMemoryDatabase> {
    init_logging();
    TestSystem::new(InMemoryDatabase::new()).await
}

fn scope() -> Vec<ProjectId> {
    vec![PROJECT_ID.into()]
}

fn ids(orders: &[Order]) -> Vec<String> {
    orders.iter().map(|o| o.id.to_string()).collect()
}

/// Three orders: a complete card payment from Russia, a pending order from Germany and an order from France that is
/// still new.
async fn populate(sys: &TestSystem<InMemoryDatabase>) -> Vec<Order> {
    let paid = sys.order_with_payment(100).await;
    sys.notify(&paid.id).await;
    let german = sys
        .new_order(order_request(250).with_payer_ip(ip("10.0.0.2")).with_payer_phone("+49301234567"))
        .await;
    let french = sys
        .new_order(
            order_request(500).with_region("FR").with_order_id("client-77").with_payer_email("jacques@example.fr"),
        )
        .await;
    vec![sys.fetch(&paid.id).await, german, french]
}

async fn find(sys: &TestSystem<InMemoryDatabase>, envelope: QueryEnvelope) -> (u64, Vec<String>) {
    let api = OrderQueryApi::new(sys.api.db().clone());
    let page = api.find_orders(&envelope, &scope(), &PageRequest::new(100, 0).sorted_by("amount")).await.unwrap();
    (page.count, page.items.iter().map(|v| v.id.to_string()).collect())
}

#[tokio::test]
async fn queries_are_scoped_to_accessible_projects() {
    let sys = setup().await;
    let orders = populate(&sys).await;
    let api = OrderQueryApi::new(sys.api.db().clone());
    let page = api.find_orders(&QueryEnvelope::new(), &scope(), &PageRequest::default()).await.unwrap();
    assert_eq!(page.count, 3);
    assert_eq!(page.items.len(), 3);

    let page = api.find_orders(&QueryEnvelope::new(), &["p-other".into()], &PageRequest::default()).await.unwrap();
    assert_eq!(page.count, 0);
    assert!(page.items.is_empty());
    let page = api.find_orders(&QueryEnvelope::new(), &[], &PageRequest::default()).await.unwrap();
    assert_eq!(page.count, 0);
    // Scoping applies to single lookups through the listing too
    let envelope = QueryEnvelope::new().with(KEY_ID, orders[0].id.as_str());
    let page = api.find_orders(&envelope, &["p-other".into()], &PageRequest::default()).await.unwrap();
    assert_eq!(page.count, 0);
}

#[tokio::test]
async fn structured_filters() {
    let sys = setup().await;
    let orders = populate(&sys).await;
    let [paid, german, french] = [&orders[0], &orders[1], &orders[2]];

    let complete = OrderStatusType::Complete.code().to_string();
    assert_eq!(find(&sys, QueryEnvelope::new().with(KEY_STATUSES, &complete)).await, (1, ids(&[paid.clone()])));
    let envelope = QueryEnvelope::new().with(KEY_STATUSES, "0").with(KEY_STATUSES, &complete);
    assert_eq!(find(&sys, envelope).await.0, 3);

    let envelope = QueryEnvelope::new().with(KEY_COUNTRIES, "DE").with(KEY_COUNTRIES, "FR");
    assert_eq!(find(&sys, envelope).await.1, ids(&[german.clone(), french.clone()]));

    let envelope = QueryEnvelope::new().with(KEY_PAYMENT_METHODS, CARD_METHOD);
    assert_eq!(find(&sys, envelope).await.1, ids(&[paid.clone()]));

    // Account search covers the project account, phone and email, case-insensitively
    assert_eq!(find(&sys, QueryEnvelope::new().with(KEY_ACCOUNT, "JACQUES@")).await.1, ids(&[french.clone()]));
    assert_eq!(find(&sys, QueryEnvelope::new().with(KEY_ACCOUNT, "+4930")).await.1, ids(&[german.clone()]));
    assert_eq!(find(&sys, QueryEnvelope::new().with(KEY_ACCOUNT, "acct-1")).await.0, 3);

    // Filters are combined
    let envelope = QueryEnvelope::new().with(KEY_COUNTRIES, "DE").with(KEY_STATUSES, &complete);
    assert_eq!(find(&sys, envelope).await.0, 0);
}

#[tokio::test]
async fn id_filters() {
    let sys = setup().await;
    let orders = populate(&sys).await;
    let target = &orders[1];
    let envelope = QueryEnvelope::new().with(KEY_ID, target.id.as_str());
    assert_eq!(find(&sys, envelope).await, (1, ids(&[target.clone()])));
    // A fragment of an id is a substring search
    let fragment = &target.id.as_str()[4..12];
    let (_, found) = find(&sys, QueryEnvelope::new().with(KEY_ID, fragment)).await;
    assert!(found.contains(&target.id.to_string()));
    // Regex metacharacters are literal text
    assert_eq!(find(&sys, QueryEnvelope::new().with(KEY_ID, ".*")).await.0, 0);
}

#[tokio::test]
async fn quick_filter_ignores_other_keys() {
    let sys = setup().await;
    let orders = populate(&sys).await;
    let envelope = QueryEnvelope::new().with(KEY_QUICK_FILTER, "client-7").with(KEY_COUNTRIES, "DE");
    assert_eq!(find(&sys, envelope).await, (1, ids(&[orders[2].clone()])));
    let envelope = QueryEnvelope::new().with(KEY_QUICK_FILTER, "acme online");
    assert_eq!(find(&sys, envelope).await.0, 3);
    let envelope = QueryEnvelope::new().with(KEY_QUICK_FILTER, "card method");
    assert_eq!(find(&sys, envelope).await.1, ids(&[orders[0].clone()]));
}

#[tokio::test]
async fn sorting_and_paging() {
    let sys = setup().await;
    let orders = populate(&sys).await;
    let api = OrderQueryApi::new(sys.api.db().clone());
    let envelope = QueryEnvelope::new();

    let page = api.find_orders(&envelope, &scope(), &PageRequest::new(2, 0).sorted_by("-amount")).await.unwrap();
    assert_eq!(page.count, 3);
    let amounts = page.items.iter().map(|v| v.project_amount_income.amount).collect::<Vec<_>>();
    assert_eq!(amounts, vec![Amount::from(500), Amount::from(250)]);

    let page = api.find_orders(&envelope, &scope(), &PageRequest::new(2, 2).sorted_by("-amount")).await.unwrap();
    assert_eq!(page.count, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, orders[0].id);

    // Status first, then amount. Unknown tokens are ignored.
    let request = PageRequest::new(10, 0).sorted_by("-status").sorted_by("bogus").sorted_by("amount");
    let page = api.find_orders(&envelope, &scope(), &request).await.unwrap();
    let order = page.items.iter().map(|v| v.id.clone()).collect::<Vec<_>>();
    assert_eq!(order, vec![orders[0].id.clone(), orders[1].id.clone(), orders[2].id.clone()]);

    // Newest first by default
    let page = api.find_orders(&envelope, &scope(), &PageRequest::default()).await.unwrap();
    let created = page.items.iter().map(|v| v.created_at).collect::<Vec<_>>();
    assert!(created.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn date_range_filters() {
    let sys = setup().await;
    let orders = populate(&sys).await;
    let db = sys.api.db();
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    for (i, order) in orders.iter().enumerate() {
        let mut order = sys.fetch(&order.id).await;
        order.created_at = base + Duration::days(i as i64);
        db.update_order(order).await.unwrap();
    }
    let day = |d: i64| (base + Duration::days(d)).timestamp().to_string();
    let envelope = QueryEnvelope::new().with(KEY_PROJECT_DATE_FROM, &day(1)).with(KEY_PROJECT_DATE_TO, &day(2));
    assert_eq!(find(&sys, envelope).await.1, ids(&orders[1..]));
    // Bounds are inclusive, and one bound is enough
    let envelope = QueryEnvelope::new().with(KEY_PROJECT_DATE_TO, &day(0));
    assert_eq!(find(&sys, envelope).await.1, ids(&orders[..1]));
    // Only orders the payment system closed have a payment-method date
    let envelope = QueryEnvelope::new().with(KEY_PM_DATE_FROM, "0");
    assert_eq!(find(&sys, envelope).await.1, ids(&orders[..1]));
    // Unparseable bounds are ignored
    let envelope = QueryEnvelope::new().with(KEY_PROJECT_DATE_FROM, "yesterday");
    assert_eq!(find(&sys, envelope).await.0, 3);
}

#[tokio::test]
async fn order_views() {
    let sys = setup().await;
    let orders = populate(&sys).await;
    let api = OrderQueryApi::new(sys.api.db().clone());

    let paid = api.fetch_order_view(&orders[0].id).await.unwrap().expect("Order view missing");
    assert_eq!(paid.status.status, 10);
    assert_eq!(paid.status.name, "Complete");
    assert_eq!(paid.project.id, PROJECT_ID);
    let income = paid.payment_method_amount_income.expect("Income block missing");
    assert_eq!((income.amount, income.currency.as_str()), (Amount::from(100), "RUB"));
    let outcome = paid.project_amount_outcome.expect("Outcome block missing");
    assert_eq!((outcome.amount, outcome.currency.as_str()), (Amount::new(dec!(1.25)), "EUR"));
    assert_eq!(paid.payment_method.map(|pm| pm.id), Some(CARD_METHOD.to_string()));
    assert!(paid.project_fee.is_some());
    assert!(paid.confirmed_at.is_some());

    let fresh = api.fetch_order_view(&orders[2].id).await.unwrap().expect("Order view missing");
    assert_eq!(fresh.status.status, 0);
    assert!(fresh.payment_method_amount_income.is_none());
    assert!(fresh.payment_method.is_none());
    assert!(fresh.project_fee.is_none());
    assert!(fresh.payer_fee.is_none());
    assert!(fresh.confirmed_at.is_none());
    assert_eq!(fresh.project_order_id.as_deref(), Some("client-77"));

    assert!(api.fetch_order_view(&"missing".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn revenue_reports() {
    let sys = setup().await;
    let first = sys.order_with_payment(100).await;
    let second = sys.order_with_payment(200).await;
    sys.notify(&first.id).await;
    sys.notify(&second.id).await;
    // Not settled, so not revenue
    sys.order_with_payment(300).await;

    let db = sys.api.db().clone();
    let now = Utc::now();
    db.record_refund(Refund::new(first.id.clone(), MERCHANT_ID.into(), Amount::new(dec!(0.5))).at(now)).await.unwrap();
    let chargeback = Refund::new(second.id.clone(), MERCHANT_ID.into(), Amount::new(dec!(0.25))).as_chargeback().at(now);
    db.record_refund(chargeback).await.unwrap();
    let elsewhere = Refund::new(second.id.clone(), "m-other".into(), Amount::from(9)).at(now);
    db.record_refund(elsewhere).await.unwrap();

    let api = RevenueApi::new(db);
    let request = RevenueDynamicRequest::new(MERCHANT_ID.into(), now, now, RevenuePeriod::Day);
    let report = api.revenue_dynamic(&request).await.unwrap();
    assert_eq!(report.revenue.count, 2);
    assert_eq!(report.revenue.total, Amount::new(dec!(3.75)));
    assert_eq!(report.refund.count, 2);
    assert_eq!(report.refund.total, Amount::new(dec!(0.75)));
    assert_eq!(report.points.len(), 1);
    assert_eq!(report.points[0].date, RevenuePointDate::for_period(RevenuePeriod::Day, &now));
    assert_eq!(report.points[0].amount, Amount::new(dec!(3.00)));

    let accounting = api.accounting_payment(&request).await.unwrap();
    assert_eq!(accounting.success_with_commissions, Amount::new(dec!(3.75)));
    assert_eq!(accounting.total_commission, Amount::new(dec!(0.15)));
    assert_eq!(accounting.success_without_commissions, Amount::new(dec!(3.60)));
    assert_eq!(accounting.total_refund, Amount::new(dec!(0.5)));
    assert_eq!(accounting.total_chargeback, Amount::new(dec!(0.25)));

    let last_year = RevenueDynamicRequest::new(
        MERCHANT_ID.into(),
        now - Duration::days(400),
        now - Duration::days(365),
        RevenuePeriod::Day,
    );
    let report = api.revenue_dynamic(&last_year).await.unwrap();
    assert!(report.points.is_empty());
    assert_eq!(report.revenue.count, 0);
    assert_eq!(api.accounting_payment(&last_year).await.unwrap(), Default::default());
}
