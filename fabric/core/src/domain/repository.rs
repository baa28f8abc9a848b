// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for the two record types the fabric reads and
//! writes. Interfaces live here, implementations in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Record | Implementations |
//! |-------|--------|----------------|
//! | `AgentRepository` | `Agent` | `InMemoryAgentRepository`, `PostgresAgentRepository` |
//! | `WebhookRepository` | `Webhook` | `InMemoryWebhookRepository`, `PostgresWebhookRepository` |
//!
//! Callers treat the store as externally synchronized; implementations must
//! be safe to share behind an `Arc`.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::agent::Agent;
use crate::domain::notification::Webhook;

/// Storage backend selected at startup.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Save agent (create or update)
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Agent>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<Agent>, RepositoryError>;

    async fn delete(&self, id: &str) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait WebhookRepository: Send + Sync {
    /// Register a webhook. Saving the same `(topic, url)` twice is a no-op.
    async fn save(&self, webhook: &Webhook) -> Result<(), RepositoryError>;

    /// All webhooks for `topic`. An unknown topic yields
    /// [`RepositoryError::NotFound`].
    async fn list_by_topic(&self, topic: &str) -> Result<Vec<Webhook>, RepositoryError>;

    async fn delete(&self, webhook: &Webhook) -> Result<(), RepositoryError>;
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
