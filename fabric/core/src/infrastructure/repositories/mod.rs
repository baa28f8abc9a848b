// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository traits defined in
//! `crate::domain::repository`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve agents and webhooks
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **PostgresAgentRepository** / **PostgresWebhookRepository** - `sqlx`
//!   over a shared `PgPool`
//! - **InMemoryAgentRepository** / **InMemoryWebhookRepository** -
//!   `parking_lot::RwLock` over a map, for tests and single-node setups

pub mod postgres_agent;
pub mod postgres_webhook;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::domain::agent::Agent;
use crate::domain::notification::Webhook;
use crate::domain::repository::{AgentRepository, RepositoryError, WebhookRepository};

pub use postgres_agent::PostgresAgentRepository;
pub use postgres_webhook::PostgresWebhookRepository;

#[derive(Clone, Default)]
pub struct InMemoryAgentRepository {
    agents: Arc<RwLock<BTreeMap<String, Agent>>>,
}

impl InMemoryAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentRepository for InMemoryAgentRepository {
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError> {
        self.agents.write().insert(agent.id.clone(), agent.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Agent>, RepositoryError> {
        Ok(self.agents.read().get(id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Agent>, RepositoryError> {
        Ok(self.agents.read().values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        self.agents.write().remove(id);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryWebhookRepository {
    hooks: Arc<RwLock<HashMap<String, Vec<Webhook>>>>,
}

impl InMemoryWebhookRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_webhooks(webhooks: impl IntoIterator<Item = Webhook>) -> Self {
        let repo = Self::new();
        {
            let mut hooks = repo.hooks.write();
            for webhook in webhooks {
                let entry = hooks.entry(webhook.topic.clone()).or_default();
                if !entry.contains(&webhook) {
                    entry.push(webhook);
                }
            }
        }
        repo
    }
}

#[async_trait]
impl WebhookRepository for InMemoryWebhookRepository {
    async fn save(&self, webhook: &Webhook) -> Result<(), RepositoryError> {
        let mut hooks = self.hooks.write();
        let entry = hooks.entry(webhook.topic.clone()).or_default();
        if !entry.contains(webhook) {
            entry.push(webhook.clone());
        }
        Ok(())
    }

    async fn list_by_topic(&self, topic: &str) -> Result<Vec<Webhook>, RepositoryError> {
        match self.hooks.read().get(topic) {
            Some(list) if !list.is_empty() => Ok(list.clone()),
            _ => Err(RepositoryError::NotFound(format!("webhooks for topic {}", topic))),
        }
    }

    async fn delete(&self, webhook: &Webhook) -> Result<(), RepositoryError> {
        let mut hooks = self.hooks.write();
        if let Some(list) = hooks.get_mut(&webhook.topic) {
            list.retain(|w| w != webhook);
            if list.is_empty() {
                hooks.remove(&webhook.topic);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_agent_save_find_delete() {
        let repo = InMemoryAgentRepository::new();
        let mut agent = Agent::new("a1", "issuer");
        repo.save(&agent).await.unwrap();

        agent.mark_launched("pid-1");
        repo.save(&agent).await.unwrap();

        let found = repo.find_by_id("a1").await.unwrap().unwrap();
        assert_eq!(found.pid, "pid-1");
        assert_eq!(repo.list_all().await.unwrap().len(), 1);

        repo.delete("a1").await.unwrap();
        assert!(repo.find_by_id("a1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_webhooks_by_topic() {
        let repo = InMemoryWebhookRepository::with_webhooks([
            Webhook::new("t", "http://a"),
            Webhook::new("t", "http://b"),
            Webhook::new("u", "http://c"),
        ]);
        // Duplicate registration is ignored
        repo.save(&Webhook::new("t", "http://a")).await.unwrap();

        let hooks = repo.list_by_topic("t").await.unwrap();
        assert_eq!(hooks.len(), 2);
        assert_eq!(hooks[0].url, "http://a");

        assert!(matches!(
            repo.list_by_topic("missing").await,
            Err(RepositoryError::NotFound(_))
        ));

        repo.delete(&Webhook::new("u", "http://c")).await.unwrap();
        assert!(matches!(
            repo.list_by_topic("u").await,
            Err(RepositoryError::NotFound(_))
        ));
    }
}
