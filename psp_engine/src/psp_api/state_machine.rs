//! Guards on the order status lifecycle. The transition table itself lives on [`OrderStatusType`].
use crate::{
    db_types::{Order, OrderStatusType},
    psp_api::errors::{SystemError, ValidationError},
};

const PAID_EARLY: &str = "order with specified identifier payed early";
const DECLINED_EARLY: &str = "payment system decline order with specified identifier early";
const CANCELED_EARLY: &str = "payment system cancel order with specified identifier early";

/// What the notify guard decided for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyGuard {
    /// The notification may be handed to the payment handler.
    Proceed,
    /// The order is settled. The notification is acknowledged without any change.
    AlreadyProcessed(&'static str),
}

/// Decides whether a payment-system notification may be processed for an order in `status`.
///
/// Orders that are still `New` never had a payment created, so a notification for them is an error. Settled orders
/// report the reason they were settled, so that payment systems stop re-sending the notification.
pub fn notify_guard(status: OrderStatusType) -> Result<NotifyGuard, ValidationError> {
    use OrderStatusType::*;
    match status {
        New => Err(ValidationError::PaymentNotCreated),
        PaymentSystemCreate | PaymentSystemRejectOnCreate => Ok(NotifyGuard::Proceed),
        Complete => Ok(NotifyGuard::AlreadyProcessed(PAID_EARLY)),
        PaymentSystemDeclined => Ok(NotifyGuard::AlreadyProcessed(DECLINED_EARLY)),
        PaymentSystemCanceled => Ok(NotifyGuard::AlreadyProcessed(CANCELED_EARLY)),
    }
}

/// Only `New` orders may have a payment created.
pub fn create_payment_guard(status: OrderStatusType) -> Result<(), ValidationError> {
    match status {
        OrderStatusType::New => Ok(()),
        OrderStatusType::Complete => Err(ValidationError::OrderAlreadyComplete),
        _ => Err(ValidationError::PaymentAlreadyCreated),
    }
}

/// Checks an order returned by a payment handler against the stored order it was derived from.
///
/// The id may not change, and the status may only stay put or move along a legal transition.
pub fn check_handler_order(stored: &Order, returned: &Order) -> Result<(), SystemError> {
    if returned.id != stored.id {
        return Err(SystemError::HandlerChangedOrderId { expected: stored.id.clone(), returned: returned.id.clone() });
    }
    if returned.status != stored.status && !stored.status.can_transition_to(returned.status) {
        return Err(SystemError::IllegalTransition {
            id: stored.id.clone(),
            from: stored.status,
            to: returned.status,
        });
    }
    Ok(())
}
