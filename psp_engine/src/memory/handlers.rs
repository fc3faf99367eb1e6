use std::{collections::HashMap, fmt::Debug, sync::Arc};

use log::*;

use crate::{
    db_types::Order,
    traits::{PaymentHandlerError, PaymentHandlerFactory, PaymentSystemHandler, ProviderSettings},
};

/// Selects payment handlers by the handler name configured on the order's payment method.
#[derive(Clone, Default)]
pub struct PaymentHandlerRegistry {
    handlers: HashMap<String, Arc<dyn PaymentSystemHandler>>,
}

impl Debug for PaymentHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = self.handlers.keys().collect::<Vec<_>>();
        names.sort();
        write!(f, "PaymentHandlerRegistry({names:?})")
    }
}

impl PaymentHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, name: &str, handler: Arc<dyn PaymentSystemHandler>) -> Self {
        self.handlers.insert(name.to_string(), handler);
        self
    }
}

impl PaymentHandlerFactory for PaymentHandlerRegistry {
    fn handler_for(
        &self,
        order: &Order,
        settings: &ProviderSettings,
    ) -> Result<Arc<dyn PaymentSystemHandler>, PaymentHandlerError> {
        let name =
            order.payment_handler_name().ok_or_else(|| PaymentHandlerError::NoPaymentMethod(order.id.to_string()))?;
        let handler = self.handlers.get(name).cloned().ok_or_else(|| {
            error!("🔔️ Order {} uses payment handler '{name}', which is not registered", order.id);
            PaymentHandlerError::HandlerNotFound(name.to_string())
        })?;
        trace!("🔔️ Using payment handler '{name}' for order {} with {} provider settings", order.id, settings.len());
        Ok(handler)
    }
}
