//! In-process events.
//!
//! Hooks registered in [`EventHooks`] are run on their own tokio tasks, fed through bounded channels, so a slow hook
//! never blocks the order flow. [`ChannelBroker`] reuses the same machinery to provide an in-process
//! [`crate::traits::MessageBroker`].
mod broker;
mod channel;
mod event_types;
mod hooks;

pub use broker::{BrokerMessage, ChannelBroker};
pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
