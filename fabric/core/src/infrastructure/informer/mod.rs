// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Resource Informer
//!
//! Client-side view of control-plane resources.
//!
//! ```text
//!  control plane ──WatchAgents──▶ AgentStreamAdapter ──ResourceEvent──▶ SharedResourceInformer
//!                  (reconnects with backoff,            (one ordered       │ read lock
//!                   relist + tombstones)                 channel)          ▼
//!                                                                   handler 1..n
//! ```
//!
//! The adapter owns reconnection; the informer never retries. Adds, updates
//! and deletes travel on one channel so that events for the same id reach
//! handlers in the order the upstream produced them.

pub mod adapter;
pub mod backoff;
pub mod shared;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::resource::ResourceEvent;

pub use adapter::AgentStreamAdapter;
pub use backoff::{BackoffConfig, BackoffState};
pub use shared::SharedResourceInformer;

/// Buffer between the adapter task and the dispatcher.
pub const EVENT_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum InformerError {
    #[error("invalid control-plane endpoint {endpoint}: {reason}")]
    Endpoint { endpoint: String, reason: String },

    #[error("watch stream failed: {0}")]
    Stream(#[from] tonic::Status),

    #[error("event channel already taken from this adapter")]
    EventsTaken,
}

/// Source of resource events for a [`SharedResourceInformer`].
pub trait StreamAdapter<T>: Send + Sync {
    /// Hand over the event channel. Only the first call returns it.
    fn take_events(&self) -> Option<mpsc::Receiver<ResourceEvent<T>>>;

    /// Stop producing events. The channel closes once the producer exits.
    fn close(&self);
}

/// Adapter fed directly through a sender, for embedding an informer over an
/// in-process event source.
pub struct ChannelAdapter<T> {
    rx: Mutex<Option<mpsc::Receiver<ResourceEvent<T>>>>,
}

impl<T> ChannelAdapter<T> {
    pub fn new(capacity: usize) -> (Self, mpsc::Sender<ResourceEvent<T>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                rx: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

impl<T: Send> StreamAdapter<T> for ChannelAdapter<T> {
    fn take_events(&self) -> Option<mpsc::Receiver<ResourceEvent<T>>> {
        self.rx.lock().take()
    }

    fn close(&self) {
        if let Some(rx) = self.rx.lock().as_mut() {
            rx.close();
        }
    }
}
