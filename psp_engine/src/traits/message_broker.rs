use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::events::OrderEvent;

/// Header carrying the delivery attempt count of a message. The engine always publishes with a count of zero.
pub const RETRY_COUNT_HEADER: &str = "x-retry-count";

pub type MessageHeaders = BTreeMap<String, i64>;

#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    #[error("The message broker is not accepting messages: {0}")]
    Closed(String),
    #[error("Could not publish message to {topic}: {reason}")]
    PublishFailed { topic: String, reason: String },
}

#[async_trait]
pub trait MessageBroker: Send + Sync {
    async fn publish(&self, topic: &str, event: &OrderEvent, headers: MessageHeaders) -> Result<(), BrokerError>;
}
