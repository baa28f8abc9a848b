// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Control-plane agent service.
//!
//! Owns writes to the agent store and publishes one [`AgentEvent`] per
//! change on the [`AgentEventBus`]. The `WatchAgents` stream is built from
//! [`ControlPlane::watch`].

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::domain::agent::{Agent, AgentEvent};
use crate::domain::repository::{AgentRepository, RepositoryError};
use crate::infrastructure::event_bus::{AgentEventBus, AgentEventReceiver};

#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("agent {0} already exists")]
    AgentExists(String),

    #[error("agent {0} not found")]
    AgentNotFound(String),

    #[error("agent id must not be empty")]
    EmptyId,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Clone)]
pub struct ControlPlane {
    store: Arc<dyn AgentRepository>,
    bus: AgentEventBus,
}

impl ControlPlane {
    pub fn new(store: Arc<dyn AgentRepository>, bus: AgentEventBus) -> Self {
        Self { store, bus }
    }

    pub async fn create_agent(
        &self,
        id: &str,
        name: &str,
        public_did: bool,
    ) -> Result<Agent, ControlPlaneError> {
        if id.is_empty() {
            return Err(ControlPlaneError::EmptyId);
        }
        if self.store.find_by_id(id).await?.is_some() {
            return Err(ControlPlaneError::AgentExists(id.to_string()));
        }

        let mut agent = Agent::new(id, name);
        agent.public_did = public_did;
        self.store.save(&agent).await?;

        info!(agent_id = %id, "Agent created");
        self.bus.publish(AgentEvent::added(agent.clone()));
        Ok(agent)
    }

    /// Replace the stored agent with `agent`.
    pub async fn update_agent(&self, agent: Agent) -> Result<Agent, ControlPlaneError> {
        let old = self
            .store
            .find_by_id(&agent.id)
            .await?
            .ok_or_else(|| ControlPlaneError::AgentNotFound(agent.id.clone()))?;

        self.store.save(&agent).await?;
        self.bus.publish(AgentEvent::updated(old, agent.clone()));
        Ok(agent)
    }

    pub async fn delete_agent(&self, id: &str) -> Result<Agent, ControlPlaneError> {
        let old = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ControlPlaneError::AgentNotFound(id.to_string()))?;

        self.store.delete(id).await?;
        info!(agent_id = %id, "Agent deleted");
        self.bus.publish(AgentEvent::deleted(old.clone()));
        Ok(old)
    }

    pub async fn list_agents(&self) -> Result<Vec<Agent>, ControlPlaneError> {
        Ok(self.store.list_all().await?)
    }

    /// Subscribe to live events, then take a snapshot of the store.
    ///
    /// Subscribing first means no change is lost between the two; a change
    /// may show up in both, which watchers treat as an update.
    pub async fn watch(&self) -> Result<(Vec<Agent>, AgentEventReceiver), ControlPlaneError> {
        let events = self.bus.subscribe();
        let snapshot = self.store.list_all().await?;
        Ok((snapshot, events))
    }
}
