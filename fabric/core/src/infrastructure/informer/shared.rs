// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{InformerError, StreamAdapter};
use crate::domain::resource::{Resource, ResourceEvent, ResourceEventHandler};
use crate::infrastructure::metrics;

/// Fans resource events out to every registered handler.
///
/// Handlers run sequentially on the task that calls [`run`](Self::run),
/// under the read side of the handler lock. Registration takes the write
/// side, so a handler added while an event is being dispatched sees the
/// next event onwards. A handler that blocks stalls every other handler.
pub struct SharedResourceInformer<T: Resource> {
    handlers: RwLock<Vec<Arc<dyn ResourceEventHandler<T>>>>,
    adapter: Arc<dyn StreamAdapter<T>>,
    events: Mutex<mpsc::Receiver<ResourceEvent<T>>>,
}

impl<T: Resource> SharedResourceInformer<T> {
    pub fn new(adapter: impl StreamAdapter<T> + 'static) -> Result<Self, InformerError> {
        let events = adapter.take_events().ok_or(InformerError::EventsTaken)?;
        Ok(Self {
            handlers: RwLock::new(Vec::new()),
            adapter: Arc::new(adapter),
            events: Mutex::new(events),
        })
    }

    pub async fn add_event_handler(&self, handler: Arc<dyn ResourceEventHandler<T>>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
        debug!(handlers = handlers.len(), "Resource event handler registered");
    }

    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }

    /// Dispatch events until `stop` is cancelled or the adapter's channel
    /// closes. Concurrent calls queue behind each other.
    pub async fn run(&self, stop: CancellationToken) {
        let mut events = self.events.lock().await;
        info!("Resource informer running");

        loop {
            let event = tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    info!("Resource informer stopped");
                    return;
                }
                event = events.recv() => match event {
                    Some(event) => event,
                    None => {
                        info!("Resource event stream closed; informer exiting");
                        return;
                    }
                },
            };

            self.dispatch(event).await;
        }
    }

    async fn dispatch(&self, event: ResourceEvent<T>) {
        let kind = event.kind();
        metrics::record_informer_event(kind);

        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            let result = match &event {
                ResourceEvent::Added(obj) => handler.on_add(obj).await,
                ResourceEvent::Updated { old, new } => handler.on_update(old, new).await,
                ResourceEvent::Deleted(obj) => handler.on_delete(obj).await,
            };
            if let Err(e) = result {
                warn!(kind, key = %event.key(), error = %e, "Resource event handler failed");
            }
        }
    }

    /// Stop the underlying adapter.
    pub fn close(&self) {
        self.adapter.close();
    }
}

impl<T: Resource> Drop for SharedResourceInformer<T> {
    fn drop(&mut self) {
        self.adapter.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::Agent;
    use crate::domain::resource::ResourceEventHandlerFuncs;
    use crate::infrastructure::informer::ChannelAdapter;
    use parking_lot::Mutex as SyncMutex;

    #[tokio::test]
    async fn test_run_returns_when_channel_closes() {
        let (adapter, tx) = ChannelAdapter::<Agent>::new(4);
        let informer = SharedResourceInformer::new(adapter).unwrap();

        let seen = Arc::new(SyncMutex::new(Vec::new()));
        let log = seen.clone();
        informer
            .add_event_handler(Arc::new(ResourceEventHandlerFuncs::new().on_add(
                move |agent: &Agent| {
                    log.lock().push(agent.id.clone());
                    Ok(())
                },
            )))
            .await;

        tx.send(ResourceEvent::Added(Agent::new("a1", "x"))).await.unwrap();
        tx.send(ResourceEvent::Added(Agent::new("a2", "y"))).await.unwrap();
        drop(tx);

        informer.run(CancellationToken::new()).await;
        assert_eq!(*seen.lock(), vec!["a1".to_string(), "a2".to_string()]);
    }

    #[tokio::test]
    async fn test_handler_error_does_not_stop_dispatch() {
        let (adapter, tx) = ChannelAdapter::<Agent>::new(4);
        let informer = SharedResourceInformer::new(adapter).unwrap();

        let count = Arc::new(SyncMutex::new(0));
        let c = count.clone();
        informer
            .add_event_handler(Arc::new(
                ResourceEventHandlerFuncs::new().on_add(|_: &Agent| anyhow::bail!("boom")),
            ))
            .await;
        informer
            .add_event_handler(Arc::new(ResourceEventHandlerFuncs::new().on_add(
                move |_: &Agent| {
                    *c.lock() += 1;
                    Ok(())
                },
            )))
            .await;
        assert_eq!(informer.handler_count().await, 2);

        tx.send(ResourceEvent::Added(Agent::new("a1", "x"))).await.unwrap();
        drop(tx);
        informer.run(CancellationToken::new()).await;
        assert_eq!(*count.lock(), 1);
    }
}
