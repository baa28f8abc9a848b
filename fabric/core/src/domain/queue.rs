// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Queue Abstraction
//!
//! Durable FIFO with two capabilities, [`Publisher`] and [`Listener`]. The
//! traits hide the broker; implementations live in
//! `crate::infrastructure::queue` (RabbitMQ via `lapin`, and an in-memory
//! broker for tests and single-process deployments).
//!
//! | Capability | Operations |
//! |------------|------------|
//! | `Publisher` | `publish(body, content_type)`, `publish_message(delivery)`, `close()` |
//! | `Listener` | `listen()` (once per instance), `close()` |
//!
//! No acknowledgements are modelled here: from the queue's perspective a
//! delivery is at-most-once. The delivery stream is infinite; it ends only
//! when the underlying channel closes, and the consumer decides whether to
//! reconnect.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::collections::BTreeMap;
use std::pin::Pin;
use thiserror::Error;

/// A message as carried by the broker between publish and consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub body: Bytes,
    pub content_type: String,
    /// Extra message attributes (AMQP headers).
    pub headers: BTreeMap<String, String>,
}

impl Delivery {
    pub fn new(body: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}

/// Lazy, unbounded sequence of deliveries. Ends when the channel closes.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Delivery> + Send>>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("unable to connect to broker at {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("unable to declare queue {queue}: {reason}")]
    Declare { queue: String, reason: String },

    #[error("publish to {queue} failed: {reason}")]
    Publish { queue: String, reason: String },

    #[error("unable to consume from {queue}: {reason}")]
    Consume { queue: String, reason: String },

    #[error("listen() already called on this listener")]
    AlreadyListening,

    #[error("queue {0} is closed")]
    Closed(String),

    #[error("error closing connection: {0}")]
    Close(String),
}

/// Producer side of a queue. Safe for concurrent use.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a message with attributes. Synchronous to the broker's local
    /// channel, not to the final consumer.
    async fn publish_message(&self, message: Delivery) -> Result<(), QueueError>;

    async fn publish(&self, body: Bytes, content_type: &str) -> Result<(), QueueError> {
        self.publish_message(Delivery::new(body, content_type)).await
    }

    async fn close(&self) -> Result<(), QueueError>;
}

/// Consumer side of a queue.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Start consuming. Fails with [`QueueError::AlreadyListening`] when
    /// called a second time on the same listener.
    async fn listen(&self) -> Result<DeliveryStream, QueueError>;

    async fn close(&self) -> Result<(), QueueError>;
}
