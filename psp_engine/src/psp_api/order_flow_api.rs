use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    config::EngineConfig,
    db_types::{Order, OrderId, OrderStatusType},
    events::{EventProducers, OrderCreatedEvent, OrderEvent, OrderFinalizedEvent},
    psp_api::{
        collaborators::Collaborators,
        errors::{OrderFlowError, SystemError, ValidationError},
        fee_engine::FeeEngine,
        intake::{validate_payment_method, IntakeValidator, ResolvedPaymentMethod},
        order_objects::{CreatePaymentRequest, NotifyOutcome, OrderPaymentNotification, OrderScalar},
        state_machine::{check_handler_order, create_payment_guard, notify_guard, NotifyGuard},
    },
    traits::{MessageHeaders, OrderRepository, PaymentResponse, PaymentStatus, ProviderSettings, RETRY_COUNT_HEADER},
};

/// `OrderFlowApi` is the primary API for the order lifecycle: it creates orders from merchant requests, asks payment
/// systems to create payments for them, and settles them in response to payment-system notifications.
///
/// Every flow reads the order, works on an in-memory copy, and writes it back once. Updates carry the version that was
/// read, so two concurrent notifications for the same order cannot both be applied.
pub struct OrderFlowApi<B> {
    db: B,
    collaborators: Collaborators,
    config: EngineConfig,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, collaborators: Collaborators, config: EngineConfig, producers: EventProducers) -> Self {
        Self { db, collaborators, config, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn fee_engine(&self) -> FeeEngine<'_> {
        FeeEngine::new(&self.collaborators, &self.config.psp_accounting_currency)
    }

    fn validator(&self) -> IntakeValidator<'_> {
        IntakeValidator::new(&self.collaborators, self.config.require_signature)
    }
}

/// Logs a failed flow at a level that suits its class, and passes the error on.
fn log_failure(flow: &str, e: OrderFlowError) -> OrderFlowError {
    match &e {
        OrderFlowError::Validation(v) => debug!("📥️ {flow} rejected. {v}"),
        OrderFlowError::System(s) => error!("📥️ {flow} failed. {s}"),
    }
    e
}

impl<B> OrderFlowApi<B>
where B: OrderRepository
{
    /// Validates a merchant's order request and stores the resulting order, with status `New`.
    ///
    /// If the request selects a payment method, the order's fees are calculated as well. Otherwise the order carries
    /// no fee buckets until a payment is created for it.
    pub async fn process_new_order(&self, request: OrderScalar) -> Result<Order, OrderFlowError> {
        let flow = format!("Order request [{request}]");
        self.new_order(request).await.map_err(|e| log_failure(&flow, e))
    }

    async fn new_order(&self, request: OrderScalar) -> Result<Order, OrderFlowError> {
        let validator = self.validator();
        let ctx = validator.validate(&self.db, &request).await?;
        let has_payment_method = ctx.payment_method.is_some();
        let mut order = validator.build_order(ctx, &request).await?;
        if has_payment_method {
            self.fee_engine().process_order_commissions(&mut order).await?;
        }
        let order = self.db.insert_order(order).await?;
        info!(
            "📥️ Order {} created for project {} ({} {})",
            order.id, order.project.id, order.project_income_amount, order.project_income_currency
        );
        self.call_order_created_hook(&order).await;
        Ok(order)
    }

    /// Asks the payment system to create a payment for a `New` order.
    ///
    /// If the payer picked a different payment method from the one the order was priced with, the new method's limits
    /// are checked and the fees are recalculated. The handler's verdict decides the order's new status:
    ///
    /// | Handler result | New status                    |
    /// |----------------|-------------------------------|
    /// | `Ok`           | `PaymentSystemCreate`         |
    /// | `ErrorSystem`  | `PaymentSystemRejectOnCreate` |
    /// | anything else  | unchanged (`New`)             |
    ///
    /// The order is stored in every case, and the handler's response is returned.
    pub async fn process_create_payment(
        &self,
        request: CreatePaymentRequest,
        settings: &ProviderSettings,
    ) -> Result<PaymentResponse, OrderFlowError> {
        let flow = format!("Payment creation for order {}", request.order_id);
        self.create_payment(request, settings).await.map_err(|e| log_failure(&flow, e))
    }

    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
        settings: &ProviderSettings,
    ) -> Result<PaymentResponse, OrderFlowError> {
        let mut order = self.db.fetch_order_by_id(&request.order_id).await?.ok_or(ValidationError::OrderNotFound)?;
        create_payment_guard(order.status)?;
        let method = self
            .collaborators
            .payment_methods
            .fetch_payment_method(&request.payment_method_id)
            .await?
            .ok_or(ValidationError::PaymentMethodNotFound)?;
        let (method, payment_system) = validate_payment_method(method)?;
        let fees = self.fee_engine();
        let method_changed = order.payment_method.as_ref().map_or(true, |pm| pm.id != method.id);
        if method_changed {
            debug!("📥️ Order {} is paid with payment method {}. Recalculating fees.", order.id, method.id);
            let outcome_amount = self
                .validator()
                .check_payment_method_limits(&method, &order.project_income_currency, order.project_income_amount)
                .await?;
            let resolved = ResolvedPaymentMethod { method, payment_system, outcome_amount };
            order.payment_method = Some(resolved.snapshot());
            order.payment_method_outcome_amount = outcome_amount;
            order.payment_method_outcome_currency = Some(resolved.method.currency.clone());
            fees.process_order_commissions(&mut order).await?;
        }

        let email = request
            .email
            .clone()
            .filter(|e| !e.trim().is_empty())
            .or_else(|| order.payer_data.email.clone())
            .ok_or(ValidationError::RequiredFieldMissing("email"))?;
        if order.project_account.is_empty() {
            order.project_account = email.clone();
        }
        order.payer_data.email = Some(email);
        order.payment_requisites.extend(request.requisites.clone());
        order.payment_method_terminal_id = order
            .payment_method
            .as_ref()
            .map(|pm| pm.params.terminal.clone())
            .filter(|t| !t.is_empty());
        fees.accounting_amounts(&order).await?.apply(&mut order);

        let handler = self.collaborators.payment_handlers.handler_for(&order, settings)?;
        let response = handler.create_payment(&order, &request.requisites).await;
        match response.status {
            PaymentStatus::Ok => order.status = OrderStatusType::PaymentSystemCreate,
            PaymentStatus::ErrorSystem => {
                warn!("📥️ The payment system rejected payment creation for order {}. {}", order.id, response.message);
                order.status = OrderStatusType::PaymentSystemRejectOnCreate;
            },
            PaymentStatus::Temporary | PaymentStatus::ErrorValidation => {
                debug!("📥️ Payment for order {} was not created. {}", order.id, response.message);
            },
        }
        order.updated_at = Utc::now();
        let order = self.db.update_order(order).await?;
        info!("📥️ Payment creation for order {} finished with status {}", order.id, order.status);
        Ok(response)
    }

    /// Processes a payment-system notification about an order.
    ///
    /// Notifications for settled orders are acknowledged with [`NotifyOutcome::AlreadyProcessed`] and change nothing.
    /// Otherwise the order's payment handler interprets the notification:
    /// * `Temporary` results are returned as-is, and nothing is stored.
    /// * `Ok` results carry the updated order. Its accounting amounts are recalculated, it is published to the notify
    ///   topic, and then stored. If publishing fails, nothing is stored.
    /// * Any other result is stored without being published.
    pub async fn process_notify_payment(
        &self,
        notification: OrderPaymentNotification,
        settings: &ProviderSettings,
    ) -> Result<NotifyOutcome, OrderFlowError> {
        let flow = format!("Notification for order {}", notification.order_id);
        self.notify_payment(notification, settings).await.map_err(|e| log_failure(&flow, e))
    }

    async fn notify_payment(
        &self,
        notification: OrderPaymentNotification,
        settings: &ProviderSettings,
    ) -> Result<NotifyOutcome, OrderFlowError> {
        let order =
            self.db.fetch_order_by_id(&notification.order_id).await?.ok_or(ValidationError::OrderNotFound)?;
        if let NotifyGuard::AlreadyProcessed(message) = notify_guard(order.status)? {
            info!("🔔️ Order {} is already {}. Notification acknowledged without changes.", order.id, order.status);
            return Ok(NotifyOutcome::AlreadyProcessed { order, message: message.to_string() });
        }
        let handler = self.collaborators.payment_handlers.handler_for(&order, settings)?;
        let response = handler.process_payment(&order, &notification).await;
        match response.status {
            PaymentStatus::Temporary => {
                debug!("🔔️ Notification for order {} is not final yet. {}", order.id, response.message);
                Ok(NotifyOutcome::Handled(response))
            },
            PaymentStatus::Ok => self.settle_order(order, response).await,
            PaymentStatus::ErrorValidation | PaymentStatus::ErrorSystem => {
                warn!(
                    "🔔️ The payment handler could not process the notification for order {}. {}",
                    order.id, response.message
                );
                let mut updated = match &response.order {
                    Some(returned) => {
                        check_handler_order(&order, returned)?;
                        returned.clone()
                    },
                    None => order.clone(),
                };
                updated.version = order.version;
                updated.updated_at = Utc::now();
                self.db.update_order(updated).await?;
                Ok(NotifyOutcome::Handled(response))
            },
        }
    }

    async fn settle_order(&self, stored: Order, response: PaymentResponse) -> Result<NotifyOutcome, OrderFlowError> {
        let mut order = response.order.clone().ok_or(SystemError::HandlerReturnedNoOrder)?;
        check_handler_order(&stored, &order)?;
        order.version = stored.version;

        let income_currency = order.payment_method_income_currency.clone().unwrap_or_default();
        if self.collaborators.currencies.fetch_currency(&income_currency).await?.is_none() {
            return Err(SystemError::UnknownPaymentSystemCurrency(income_currency).into());
        }
        self.fee_engine().settlement_amounts(&order).await?.apply(&mut order);
        order.updated_at = Utc::now();

        let headers = MessageHeaders::from([(RETRY_COUNT_HEADER.to_string(), 0)]);
        self.collaborators.broker.publish(&self.config.notify_topic, &OrderEvent::from(&order), headers).await?;
        trace!("🔔️ Order {} published to {}", order.id, self.config.notify_topic);

        let order = self.db.update_order(order).await.map_err(|e| {
            // The event is already out, so downstream services have seen a state that was never stored.
            error!("🔔️ Order {} was published but could not be stored. {e}", stored.id);
            e
        })?;
        info!("🔔️ Order {} moved from {} to {}", order.id, stored.status, order.status);
        if order.status.is_terminal() {
            self.call_order_finalized_hook(&order).await;
        }
        Ok(NotifyOutcome::Handled(response.with_order(order)))
    }

    pub async fn fetch_order(&self, id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        let order = self.db.fetch_order_by_id(id).await.map_err(|e| log_failure("Order fetch", e.into()))?;
        Ok(order)
    }

    async fn call_order_created_hook(&self, order: &Order) {
        for emitter in &self.producers.order_created_producer {
            trace!("📬️ Notifying order created hook subscribers");
            emitter.publish_event(OrderCreatedEvent::new(order.clone())).await;
        }
    }

    async fn call_order_finalized_hook(&self, order: &Order) {
        for emitter in &self.producers.order_finalized_producer {
            trace!("📬️ Notifying order finalized hook subscribers");
            emitter.publish_event(OrderFinalizedEvent::new(order.clone())).await;
        }
    }
}
