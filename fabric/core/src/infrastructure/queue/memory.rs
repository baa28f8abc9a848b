// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-process queue broker.
//!
//! Each named queue is one bounded `tokio::sync::mpsc` channel. Publishers
//! share the sending half; a single listener owns the receiving half. When
//! every publisher of a queue has been closed or dropped the listener's
//! stream ends, which mirrors a broker connection going away.

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::domain::queue::{Delivery, DeliveryStream, Listener, Publisher, QueueError};

const DEFAULT_CAPACITY: usize = 1024;

struct QueueSlot {
    /// Strong sender held until the first publisher claims it, so a listener
    /// created first does not see the queue closed.
    pending: Option<mpsc::Sender<Delivery>>,
    weak: mpsc::WeakSender<Delivery>,
    rx: Option<mpsc::Receiver<Delivery>>,
}

impl QueueSlot {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            weak: tx.downgrade(),
            pending: Some(tx),
            rx: Some(rx),
        }
    }
}

#[derive(Clone)]
pub struct InMemoryBroker {
    capacity: usize,
    queues: Arc<Mutex<HashMap<String, QueueSlot>>>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl InMemoryBroker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queues: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn publisher(&self, queue: &str) -> MemoryPublisher {
        let mut queues = self.queues.lock();
        let slot = queues
            .entry(queue.to_string())
            .or_insert_with(|| QueueSlot::new(self.capacity));

        let sender = match slot.pending.take().or_else(|| slot.weak.upgrade()) {
            Some(sender) => sender,
            None => {
                // Every earlier publisher is gone and the queue is closed;
                // start a fresh one for the next listener.
                let (tx, rx) = mpsc::channel(self.capacity);
                *slot = QueueSlot {
                    pending: None,
                    weak: tx.downgrade(),
                    rx: Some(rx),
                };
                tx
            }
        };

        MemoryPublisher {
            queue: queue.to_string(),
            sender: Mutex::new(Some(sender)),
        }
    }

    pub fn listener(&self, queue: &str) -> MemoryListener {
        let mut queues = self.queues.lock();
        let slot = queues
            .entry(queue.to_string())
            .or_insert_with(|| QueueSlot::new(self.capacity));

        MemoryListener {
            queue: queue.to_string(),
            rx: Mutex::new(slot.rx.take()),
            listening: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }
}

pub struct MemoryPublisher {
    queue: String,
    sender: Mutex<Option<mpsc::Sender<Delivery>>>,
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish_message(&self, message: Delivery) -> Result<(), QueueError> {
        let sender = self.sender.lock().clone();
        let Some(sender) = sender else {
            return Err(QueueError::Closed(self.queue.clone()));
        };
        sender
            .send(message)
            .await
            .map_err(|_| QueueError::Closed(self.queue.clone()))
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.sender.lock().take();
        Ok(())
    }
}

pub struct MemoryListener {
    queue: String,
    rx: Mutex<Option<mpsc::Receiver<Delivery>>>,
    listening: AtomicBool,
    cancel: CancellationToken,
}

#[async_trait]
impl Listener for MemoryListener {
    async fn listen(&self) -> Result<DeliveryStream, QueueError> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(QueueError::AlreadyListening);
        }
        let rx = self.rx.lock().take().ok_or_else(|| QueueError::Consume {
            queue: self.queue.clone(),
            reason: "queue already has a consumer".to_string(),
        })?;

        let stream = ReceiverStream::new(rx).take_until(self.cancel.clone().cancelled_owned());
        Ok(Box::pin(stream))
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.cancel.cancel();
        self.rx.lock().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_fifo_delivery() {
        let broker = InMemoryBroker::default();
        let listener = broker.listener("q");
        let publisher = broker.publisher("q");

        publisher
            .publish(Bytes::from_static(b"one"), "application/json")
            .await
            .unwrap();
        publisher
            .publish(Bytes::from_static(b"two"), "application/json")
            .await
            .unwrap();

        let mut stream = listener.listen().await.unwrap();
        assert_eq!(stream.next().await.unwrap().body.as_ref(), b"one");
        let second = stream.next().await.unwrap();
        assert_eq!(second.body.as_ref(), b"two");
        assert_eq!(second.content_type, "application/json");
    }

    #[tokio::test]
    async fn test_second_listen_fails() {
        let broker = InMemoryBroker::default();
        let listener = broker.listener("q");
        let _stream = listener.listen().await.unwrap();
        assert!(matches!(
            listener.listen().await,
            Err(QueueError::AlreadyListening)
        ));
    }

    #[tokio::test]
    async fn test_stream_ends_when_publishers_close() {
        let broker = InMemoryBroker::default();
        let publisher = broker.publisher("q");
        let listener = broker.listener("q");
        let mut stream = listener.listen().await.unwrap();

        publisher
            .publish(Bytes::from_static(b"last"), "application/json")
            .await
            .unwrap();
        publisher.close().await.unwrap();

        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_none());
        assert!(matches!(
            publisher
                .publish(Bytes::from_static(b"late"), "application/json")
                .await,
            Err(QueueError::Closed(_))
        ));
    }

    #[tokio::test]
    async fn test_listener_close_ends_stream() {
        let broker = InMemoryBroker::default();
        let _publisher = broker.publisher("q");
        let listener = broker.listener("q");
        let mut stream = listener.listen().await.unwrap();

        listener.close().await.unwrap();
        assert!(stream.next().await.is_none());
    }
}
