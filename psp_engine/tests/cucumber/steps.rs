use std::str::FromStr;

use cucumber::{then, when};
use psp_common::Amount;
use psp_engine::{
    db_types::OrderStatusType,
    order_objects::{CreatePaymentRequest, NotifyOutcome, OrderScalar},
};
use rust_decimal::Decimal;

use crate::{
    cucumber::PspWorld,
    support::fixtures::{ip, order_request, CARD_METHOD, PAYER_EMAIL, SETTINGS},
};

fn request(amount: i64, currency: &str) -> OrderScalar {
    order_request(amount).with_currency(currency)
}

async fn place_order(world: &mut PspWorld, request: OrderScalar) {
    let result = world.sys().api.process_new_order(request).await;
    world.record(result);
}

#[when(expr = "a payer orders {int} {word}")]
async fn order(world: &mut PspWorld, amount: i64, currency: String) {
    place_order(world, request(amount, &currency)).await;
}

#[when(expr = "a payer at {word} orders {int} {word}")]
async fn order_from_ip(world: &mut PspWorld, address: String, amount: i64, currency: String) {
    place_order(world, request(amount, &currency).with_payer_ip(ip(&address))).await;
}

#[when(expr = "a payer at {word} orders {int} {word} by {word}")]
async fn order_with_method(world: &mut PspWorld, address: String, amount: i64, currency: String, alias: String) {
    let request = request(amount, &currency).with_payer_ip(ip(&address)).with_payment_method(&alias);
    place_order(world, request).await;
}

#[when(expr = "a payer orders {int} {word} with client order id {word}")]
async fn order_with_client_id(world: &mut PspWorld, amount: i64, currency: String, client_id: String) {
    place_order(world, request(amount, &currency).with_order_id(&client_id)).await;
}

#[when("the payer pays for the order by card")]
async fn pay_by_card(world: &mut PspWorld) {
    let id = world.last_order().id.clone();
    let request = CreatePaymentRequest::new(id.clone(), CARD_METHOD.into()).with_email(PAYER_EMAIL);
    world.sys().api.process_create_payment(request, &SETTINGS).await.expect("Error creating payment");
    let order = world.sys().fetch(&id).await;
    world.system().last_order = Some(order);
}

#[when("the payment system confirms the payment")]
async fn confirm_payment(world: &mut PspWorld) {
    let id = world.last_order().id.clone();
    let snapshot = world.sys().fetch(&id).await;
    let outcome = world.sys().notify(&id).await;
    let order = world.sys().fetch(&id).await;
    let system = world.system();
    system.snapshot = Some(snapshot);
    system.last_outcome = Some(outcome);
    system.last_order = Some(order);
}

#[then("the order is accepted")]
async fn order_accepted(world: &mut PspWorld) {
    let order = world.last_order();
    assert_eq!(order.status, OrderStatusType::New);
}

#[then(expr = "the order is rejected with {string}")]
async fn order_rejected(world: &mut PspWorld, message: String) {
    let system = world.system();
    let err = system.last_error.as_ref().expect("The last order was not rejected");
    assert!(err.is_validation(), "Expected a validation error, got {err:?}");
    assert_eq!(err.public_message(), message);
}

#[then(expr = "the order is for fixed package {word}")]
async fn check_fixed_package(world: &mut PspWorld, package_id: String) {
    let package = world.last_order().fixed_package.as_ref().expect("No fixed package was selected");
    assert_eq!(package.id.as_str(), package_id);
}

#[then(expr = "the order is worth {word} {word} to the merchant")]
async fn check_merchant_amount(world: &mut PspWorld, amount: String, currency: String) {
    let order = world.last_order();
    let amount = Decimal::from_str(&amount).expect("Not a valid amount");
    assert_eq!(order.amount_in_merchant_accounting_currency, Amount::new(amount));
    assert_eq!(order.project.merchant.accounting_currency, currency);
}

#[then(expr = "the payer is charged {int} {word}")]
async fn check_payer_charge(world: &mut PspWorld, amount: i64, currency: String) {
    let order = world.last_order();
    assert_eq!(order.payment_method_outcome_amount, Amount::from(amount));
    assert_eq!(order.payment_method_outcome_currency.as_deref(), Some(currency.as_str()));
}

#[then(expr = "the fees are {int} for the project, {int} for the payer, {int} for the PSP and {int} for the payment system")]
async fn check_fees(world: &mut PspWorld, project: i64, payer: i64, psp: i64, payment_system: i64) {
    let order = world.last_order();
    let fee = |bucket: &Option<psp_engine::db_types::FeeBucket>| {
        bucket.as_ref().map(|b| b.amount_payment_method_currency).unwrap_or_default()
    };
    assert_eq!(fee(&order.project_fee), Amount::from(project), "Project fee");
    assert_eq!(fee(&order.payer_fee), Amount::from(payer), "Payer fee");
    assert_eq!(fee(&order.psp_fee), Amount::from(psp), "PSP fee");
    assert_eq!(fee(&order.payment_system_fee), Amount::from(payment_system), "Payment system fee");
}

#[then(expr = "the order status is {word}")]
async fn check_status(world: &mut PspWorld, status: String) {
    let status = OrderStatusType::from_str(&status).expect("Not a valid order status");
    assert_eq!(world.last_order().status, status);
}

#[then(expr = "{int} order event(s) was/were published")]
async fn check_published(world: &mut PspWorld, count: usize) {
    assert_eq!(world.sys().broker.messages().len(), count);
}

#[then(expr = "the notification is acknowledged with {string}")]
async fn check_acknowledged(world: &mut PspWorld, message: String) {
    let outcome = world.system().last_outcome.as_ref().expect("No notification was processed");
    assert!(matches!(outcome, NotifyOutcome::AlreadyProcessed { .. }), "Notification was handled: {outcome:?}");
    assert_eq!(outcome.message(), message);
}

#[then("the order is unchanged")]
async fn check_unchanged(world: &mut PspWorld) {
    let system = world.system();
    let snapshot = system.snapshot.as_ref().expect("No snapshot was taken");
    assert_eq!(system.last_order.as_ref(), Some(snapshot));
}
