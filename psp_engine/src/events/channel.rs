//! Simple stateless pub-sub event handler
//!
//! Handlers have no access to the internal state of the engine. All that is received is the event itself. Handlers
//! can be async.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{
    sync::{mpsc, mpsc::error::SendError},
    task::JoinSet,
};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs the handler for every event received, until every producer has been dropped. Returns once all in-flight
    /// handler invocations have completed.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // Drop our own sender, so that the loop ends when the last producer goes away
        drop(self.sender);
        let mut jobs = JoinSet::new();
        while let Some(ev) = self.listener.recv().await {
            trace!("📬️ Handling event");
            let handler = Arc::clone(&self.handler);
            jobs.spawn(async move {
                (handler)(ev).await;
                trace!("📬️ Event handled");
            });
            // Reap whatever has finished so the set doesn't grow unboundedly on long-running handlers
            while jobs.try_join_next().is_some() {}
        }
        debug!("📬️ All producers have gone away. Waiting for {} jobs to complete", jobs.len());
        while let Some(result) = jobs.join_next().await {
            if let Err(e) = result {
                warn!("📬️ An event handler job failed: {e}");
            }
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    /// Fire-and-forget publication. Failures are logged.
    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.send_event(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }

    /// Publishes the event, reporting failure if the handler has shut down.
    pub async fn send_event(&self, event: E) -> Result<(), SendError<E>> {
        self.sender.send(event).await
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
