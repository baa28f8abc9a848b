// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Agent Event Bus - Pub/Sub for control-plane change records
//
// In-memory fan-out over a tokio broadcast channel. The control plane
// publishes every agent change here; each WatchAgents stream subscribes.
// Events are lost on restart; watchers recover through the snapshot replay.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::agent::AgentEvent;

#[derive(Clone)]
pub struct AgentEventBus {
    sender: Arc<broadcast::Sender<AgentEvent>>,
}

impl AgentEventBus {
    /// Capacity bounds how far a subscriber may fall behind before it
    /// starts losing events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish(&self, event: AgentEvent) {
        debug!(kind = ?event.kind, agent_id = ?event.agent_id(), "Publishing agent event");

        // send() errs only when nobody is subscribed
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to agent events");
        }
    }

    pub fn subscribe(&self) -> AgentEventReceiver {
        AgentEventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

}

impl Default for AgentEventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

pub struct AgentEventReceiver {
    receiver: broadcast::Receiver<AgentEvent>,
}

impl AgentEventReceiver {
    pub async fn recv(&mut self) -> Result<AgentEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}
