use async_trait::async_trait;
use log::*;

use crate::{
    events::{EventHandler, EventProducer, Handler, OrderEvent},
    traits::{BrokerError, MessageBroker, MessageHeaders},
};

/// A message as it was handed to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub headers: MessageHeaders,
    pub event: OrderEvent,
}

/// An in-process [`MessageBroker`] that delivers every published message to a single handler over a channel.
///
/// Publication fails once the handler has shut down.
#[derive(Clone)]
pub struct ChannelBroker {
    producer: EventProducer<BrokerMessage>,
}

impl ChannelBroker {
    pub fn new(producer: EventProducer<BrokerMessage>) -> Self {
        Self { producer }
    }

    /// Creates a broker together with the handler that consumes its messages. The caller is responsible for running
    /// the handler, e.g. `tokio::spawn(handler.start_handler())`.
    pub fn with_handler(buffer_size: usize, handler: Handler<BrokerMessage>) -> (Self, EventHandler<BrokerMessage>) {
        let handler = EventHandler::new(buffer_size, handler);
        (Self::new(handler.subscribe()), handler)
    }
}

#[async_trait]
impl MessageBroker for ChannelBroker {
    async fn publish(&self, topic: &str, event: &OrderEvent, headers: MessageHeaders) -> Result<(), BrokerError> {
        let message = BrokerMessage { topic: topic.to_string(), headers, event: event.clone() };
        self.producer.send_event(message).await.map_err(|_| {
            error!("📬️ Could not publish order {} to {topic}. The broker channel is closed.", event.id);
            BrokerError::Closed(topic.to_string())
        })?;
        trace!("📬️ Order {} published to {topic}", event.id);
        Ok(())
    }
}
