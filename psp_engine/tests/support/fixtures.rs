use std::{collections::BTreeMap, net::IpAddr, sync::Arc};

use chrono::Utc;
use once_cell::sync::Lazy;
use psp_common::{Amount, Secret};
use psp_engine::{
    catalog_types::{
        Currency,
        FixedPackage,
        Merchant,
        PaymentMethod,
        PaymentMethodParams,
        PaymentSystem,
        Project,
        ProjectPaymentMethod,
    },
    db_types::{Order, OrderId},
    events::EventProducers,
    memory::{
        CommissionRates,
        CommissionTable,
        InMemoryCatalog,
        PaymentHandlerRegistry,
        RateTable,
        StaticGeoLocator,
        VatTable,
    },
    order_objects::{CreatePaymentRequest, NotifyOutcome, OrderPaymentNotification, OrderScalar},
    traits::{MessageBroker, OrderRepository, ProviderSettings},
    Collaborators,
    EngineConfig,
    OrderFlowApi,
};
use rust_decimal_macros::dec;
use serde_json::json;

use super::handlers::{RecordingBroker, ScriptedHandler};

pub const PROJECT_ID: &str = "p-acme";
pub const MERCHANT_ID: &str = "m-acme";
pub const SECRET: &str = "acme-secret";
pub const CARD_ALIAS: &str = "bank_card";
pub const CARD_METHOD: &str = "pm-card";
pub const WALLET_ALIAS: &str = "wallet";
pub const WALLET_METHOD: &str = "pm-wallet";
pub const HANDLER: &str = "scripted";
pub const PAYER_EMAIL: &str = "payer@example.com";

pub static SETTINGS: Lazy<ProviderSettings> =
    Lazy::new(|| BTreeMap::from([("api_key".to_string(), "test-key".to_string())]));

pub fn ip(s: &str) -> IpAddr {
    s.parse().expect("Not a valid IP address")
}

pub fn merchant(vat: bool, shift_commission: bool) -> Merchant {
    Merchant {
        id: MERCHANT_ID.into(),
        name: "Acme Games".into(),
        accounting_currency: "EUR".into(),
        is_vat_enabled: vat,
        is_commission_to_user_enabled: shift_commission,
    }
}

/// An active project, limited to 10..10000 RUB, that offers the card and wallet payment methods.
pub fn project() -> Project {
    let now = Utc::now();
    let payment_methods = BTreeMap::from([
        (CARD_ALIAS.to_string(), vec![ProjectPaymentMethod { id: CARD_METHOD.into(), added_at: now }]),
        (WALLET_ALIAS.to_string(), vec![ProjectPaymentMethod { id: WALLET_METHOD.into(), added_at: now }]),
    ]);
    Project {
        id: PROJECT_ID.into(),
        merchant: merchant(false, false),
        name: "Acme Online".into(),
        is_active: true,
        secret_key: Secret::new(SECRET.to_string()),
        callback_protocol: "default".into(),
        callback_currency: "RUB".into(),
        limits_currency: "RUB".into(),
        min_payment_amount: Amount::from(10),
        max_payment_amount: Amount::from(10_000),
        is_allow_dynamic_notify_urls: false,
        is_allow_dynamic_redirect_urls: true,
        url_redirect_success: Some("https://acme.example/success".into()),
        url_redirect_fail: Some("https://acme.example/fail".into()),
        url_check_account: None,
        url_process_payment: None,
        send_notify_email: false,
        notify_emails: vec![],
        payment_methods,
        fixed_packages: BTreeMap::new(),
    }
}

pub fn fixed_package(id: &str, region: &str, price: i64, currency: &str) -> FixedPackage {
    FixedPackage {
        id: id.into(),
        name: format!("{price} {currency} pack"),
        region: region.to_string(),
        price: Amount::from(price),
        currency: currency.to_string(),
        is_active: true,
    }
}

fn payment_system(id: &str, accounting_currency: &str) -> PaymentSystem {
    PaymentSystem {
        id: id.into(),
        name: format!("{id} gateway"),
        country: "RU".into(),
        accounting_currency: accounting_currency.into(),
        accounting_period: "month".into(),
        is_active: true,
    }
}

fn payment_method(id: &str, currency: &str, max: i64, ps: PaymentSystem) -> PaymentMethod {
    PaymentMethod {
        id: id.into(),
        name: format!("{id} method"),
        group_alias: id.into(),
        currency: currency.into(),
        min_payment_amount: Amount::from(1),
        max_payment_amount: Amount::from(max),
        is_active: true,
        params: PaymentMethodParams {
            handler: HANDLER.into(),
            terminal: format!("T-{id}"),
            external_id: format!("ext-{id}"),
            other: BTreeMap::new(),
        },
        payment_system: Some(ps),
    }
}

pub fn card_method() -> PaymentMethod {
    payment_method(CARD_METHOD, "RUB", 50_000, payment_system("ps-cards", "EUR"))
}

pub fn wallet_method() -> PaymentMethod {
    payment_method(WALLET_METHOD, "USD", 1_000, payment_system("ps-wallets", "USD"))
}

/// A request for `amount` RUB from the fixture project.
pub fn order_request(amount: i64) -> OrderScalar {
    OrderScalar::new(PROJECT_ID, Amount::from(amount), "acct-1").with_currency("RUB")
}

/// Handles on the in-memory collaborators a [`TestSystem`] was wired with. They share state with the running API, so
/// tests may change reference data at any point.
#[derive(Clone, Default)]
pub struct Tables {
    pub catalog: InMemoryCatalog,
    pub rates: RateTable,
    pub commissions: CommissionTable,
    pub vat: VatTable,
    pub geo: StaticGeoLocator,
}

impl Tables {
    pub async fn seeded() -> Self {
        let tables = Self::default();
        let catalog = &tables.catalog;
        catalog.insert_project(project()).await;
        catalog.insert_payment_method(card_method()).await;
        catalog.insert_payment_method(wallet_method()).await;
        for (code, a3, name) in [(643, "RUB", "Russian ruble"), (840, "USD", "US dollar"), (978, "EUR", "Euro")] {
            catalog.insert_currency(Currency::new(code, a3, name)).await;
        }
        tables.rates.set_rate("USD", "RUB", dec!(65)).await.expect("Error setting rate");
        tables.rates.set_rate("EUR", "RUB", dec!(80)).await.expect("Error setting rate");
        tables.rates.set_rate("EUR", "USD", dec!(1.25)).await.expect("Error setting rate");
        let card_rates = CommissionRates::new(dec!(3), dec!(1), dec!(2));
        tables.commissions.set_rates(PROJECT_ID.into(), CARD_METHOD.into(), card_rates).await;
        let wallet_rates = CommissionRates::new(dec!(2), dec!(1), dec!(0));
        tables.commissions.set_rates(PROJECT_ID.into(), WALLET_METHOD.into(), wallet_rates).await;
        tables.vat.set_rate("RU", dec!(10)).await;
        tables.geo.insert_country(ip("10.0.0.1"), "RU").await;
        tables.geo.insert_country(ip("10.0.0.2"), "DE").await;
        tables
    }

    /// Replaces the fixture project with a modified copy.
    pub async fn update_project<F: FnOnce(&mut Project)>(&self, f: F) {
        use psp_engine::traits::ProjectLookup;
        let mut project =
            self.catalog.fetch_project(&PROJECT_ID.into()).await.expect("Catalog error").expect("Project missing");
        f(&mut project);
        self.catalog.insert_project(project).await;
    }
}

pub struct TestSystem<B> {
    pub api: OrderFlowApi<B>,
    pub tables: Tables,
    pub handler: Arc<ScriptedHandler>,
    pub broker: Arc<RecordingBroker>,
}

impl<B: OrderRepository> TestSystem<B> {
    pub async fn new(db: B) -> Self {
        Self::with_options(db, EngineConfig::default(), EventProducers::default(), None).await
    }

    /// Wires an API over `db` and freshly seeded tables. If no broker is given, messages are recorded in
    /// [`TestSystem::broker`].
    pub async fn with_options(
        db: B,
        config: EngineConfig,
        producers: EventProducers,
        broker: Option<Arc<dyn MessageBroker>>,
    ) -> Self {
        let tables = Tables::seeded().await;
        let handler = Arc::new(ScriptedHandler::default());
        let recorder = Arc::new(RecordingBroker::default());
        let registry = PaymentHandlerRegistry::new().with_handler(HANDLER, handler.clone());
        let collaborators = Collaborators {
            projects: Arc::new(tables.catalog.clone()),
            payment_methods: Arc::new(tables.catalog.clone()),
            currencies: Arc::new(tables.catalog.clone()),
            rates: Arc::new(tables.rates.clone()),
            commissions: Arc::new(tables.commissions.clone()),
            vat: Arc::new(tables.vat.clone()),
            geo: Arc::new(tables.geo.clone()),
            payment_handlers: Arc::new(registry),
            broker: broker.unwrap_or_else(|| recorder.clone() as Arc<dyn MessageBroker>),
        };
        let api = OrderFlowApi::new(db, collaborators, config, producers);
        Self { api, tables, handler, broker: recorder }
    }

    pub async fn new_order(&self, request: OrderScalar) -> Order {
        self.api.process_new_order(request).await.expect("Error creating order")
    }

    /// Creates a card order for `amount` RUB and has the payment system accept the payment.
    pub async fn order_with_payment(&self, amount: i64) -> Order {
        let order = self.new_order(order_request(amount).with_payment_method(CARD_ALIAS)).await;
        let request = CreatePaymentRequest::new(order.id.clone(), CARD_METHOD.into()).with_email(PAYER_EMAIL);
        self.api.process_create_payment(request, &SETTINGS).await.expect("Error creating payment");
        self.fetch(&order.id).await
    }

    pub async fn notify(&self, id: &OrderId) -> NotifyOutcome {
        self.try_notify(id).await.expect("Error processing notification")
    }

    pub async fn try_notify(&self, id: &OrderId) -> Result<NotifyOutcome, psp_engine::OrderFlowError> {
        let notification = OrderPaymentNotification::new(id.clone(), json!({"status": "callback"}));
        self.api.process_notify_payment(notification, &SETTINGS).await
    }

    pub async fn fetch(&self, id: &OrderId) -> Order {
        self.api.fetch_order(id).await.expect("Error fetching order").expect("Order does not exist")
    }
}
