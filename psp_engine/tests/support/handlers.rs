use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use chrono::Utc;
use mockall::mock;
use psp_engine::{
    db_types::{Order, OrderStatusType},
    events::{BrokerMessage, OrderEvent},
    order_objects::OrderPaymentNotification,
    traits::{BrokerError, MessageBroker, MessageHeaders, PaymentResponse, PaymentStatus, PaymentSystemHandler},
};

/// What the scripted payment system answers to a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyScript {
    /// The payment succeeded, and was paid in the payment method's currency
    Complete,
    /// The payment succeeded, but the payment system reports it in the given currency
    CompleteIn(String),
    Decline,
    Temporary,
    /// The handler fails with the given status and returns no order
    Fail(PaymentStatus),
    /// The handler claims success, but moves the order back to `New`
    Regress,
}

/// A payment system that answers with whatever the test scripted, and counts how often it was called.
#[derive(Debug)]
pub struct ScriptedHandler {
    create_status: Mutex<PaymentStatus>,
    notify: Mutex<NotifyScript>,
    create_calls: AtomicUsize,
    notify_calls: AtomicUsize,
}

impl Default for ScriptedHandler {
    fn default() -> Self {
        Self {
            create_status: Mutex::new(PaymentStatus::Ok),
            notify: Mutex::new(NotifyScript::Complete),
            create_calls: AtomicUsize::new(0),
            notify_calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedHandler {
    pub fn answer_create_with(&self, status: PaymentStatus) {
        *self.create_status.lock().unwrap() = status;
    }

    pub fn answer_notify_with(&self, script: NotifyScript) {
        *self.notify.lock().unwrap() = script;
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn notify_calls(&self) -> usize {
        self.notify_calls.load(Ordering::SeqCst)
    }
}

fn settled(order: &Order, status: OrderStatusType, currency: Option<String>) -> Order {
    let mut updated = order.clone();
    updated.status = status;
    updated.payment_method_order_id = Some(format!("ps-{}", order.id));
    updated.payment_method_income_amount = order.payment_method_outcome_amount;
    updated.payment_method_income_currency = currency.or_else(|| order.payment_method_outcome_currency.clone());
    updated.payment_method_order_closed_at = Some(Utc::now());
    updated
}

#[async_trait]
impl PaymentSystemHandler for ScriptedHandler {
    async fn create_payment(&self, _order: &Order, _requisites: &BTreeMap<String, String>) -> PaymentResponse {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let status = *self.create_status.lock().unwrap();
        PaymentResponse::new(status, format!("create: {status:?}")).with_redirect_url("https://pay.example/checkout")
    }

    async fn process_payment(&self, order: &Order, _notification: &OrderPaymentNotification) -> PaymentResponse {
        self.notify_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.notify.lock().unwrap().clone();
        match script {
            NotifyScript::Complete => {
                PaymentResponse::ok("payment confirmed").with_order(settled(order, OrderStatusType::Complete, None))
            },
            NotifyScript::CompleteIn(currency) => PaymentResponse::ok("payment confirmed")
                .with_order(settled(order, OrderStatusType::Complete, Some(currency))),
            NotifyScript::Decline => PaymentResponse::ok("payment declined")
                .with_order(settled(order, OrderStatusType::PaymentSystemDeclined, None)),
            NotifyScript::Temporary => PaymentResponse::new(PaymentStatus::Temporary, "payment pending"),
            NotifyScript::Fail(status) => PaymentResponse::new(status, "notification rejected"),
            NotifyScript::Regress => {
                let mut updated = order.clone();
                updated.status = OrderStatusType::New;
                PaymentResponse::ok("payment confirmed").with_order(updated)
            },
        }
    }
}

/// Records every published message.
#[derive(Debug, Default)]
pub struct RecordingBroker {
    messages: Mutex<Vec<BrokerMessage>>,
}

impl RecordingBroker {
    pub fn messages(&self) -> Vec<BrokerMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageBroker for RecordingBroker {
    async fn publish(&self, topic: &str, event: &OrderEvent, headers: MessageHeaders) -> Result<(), BrokerError> {
        let message = BrokerMessage { topic: topic.to_string(), headers, event: event.clone() };
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

mock! {
    pub Broker {}

    #[async_trait]
    impl MessageBroker for Broker {
        async fn publish(&self, topic: &str, event: &OrderEvent, headers: MessageHeaders) -> Result<(), BrokerError>;
    }
}
