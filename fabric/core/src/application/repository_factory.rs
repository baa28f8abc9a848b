// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete repository implementations based on the configured
//! storage backend. The domain layer only sees the traits; the choice of
//! in-memory or PostgreSQL storage is made here, once, at startup.

use anyhow::{bail, Result};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use crate::domain::repository::{AgentRepository, StorageBackend, WebhookRepository};
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::{
    InMemoryAgentRepository, InMemoryWebhookRepository, PostgresAgentRepository,
    PostgresWebhookRepository,
};

/// Creates an AgentRepository implementation based on the configured backend
pub fn create_agent_repository(
    backend: &StorageBackend,
    pool: Option<&PgPool>,
) -> Result<Arc<dyn AgentRepository>> {
    match (backend, pool) {
        (StorageBackend::InMemory, _) => Ok(Arc::new(InMemoryAgentRepository::new())),
        (StorageBackend::PostgreSQL(_), Some(pool)) => {
            Ok(Arc::new(PostgresAgentRepository::new(pool.clone())))
        }
        (StorageBackend::PostgreSQL(_), None) => {
            bail!("PostgreSQL agent repository requires a connection pool")
        }
    }
}

/// Creates a WebhookRepository implementation based on the configured backend
pub fn create_webhook_repository(
    backend: &StorageBackend,
    pool: Option<&PgPool>,
) -> Result<Arc<dyn WebhookRepository>> {
    match (backend, pool) {
        (StorageBackend::InMemory, _) => Ok(Arc::new(InMemoryWebhookRepository::new())),
        (StorageBackend::PostgreSQL(_), Some(pool)) => {
            Ok(Arc::new(PostgresWebhookRepository::new(pool.clone())))
        }
        (StorageBackend::PostgreSQL(_), None) => {
            bail!("PostgreSQL webhook repository requires a connection pool")
        }
    }
}

/// Both stores for one process, sharing a pool when backed by PostgreSQL.
#[derive(Clone)]
pub struct Stores {
    pub agents: Arc<dyn AgentRepository>,
    pub webhooks: Arc<dyn WebhookRepository>,
}

impl Stores {
    /// Open the stores for `backend`. A PostgreSQL backend is connected and
    /// migrated before the repositories are handed out.
    pub async fn open(backend: &StorageBackend) -> Result<Self> {
        let database = match backend {
            StorageBackend::InMemory => {
                info!("Using in-memory stores");
                None
            }
            StorageBackend::PostgreSQL(config) => {
                let database = Database::new(&config.connection_string).await?;
                database.migrate().await?;
                info!(
                    applied = database.applied_migrations().await,
                    "Connected to PostgreSQL stores"
                );
                Some(database)
            }
        };
        let pool = database.as_ref().map(Database::get_pool);

        Ok(Self {
            agents: create_agent_repository(backend, pool)?,
            webhooks: create_webhook_repository(backend, pool)?,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            agents: Arc::new(InMemoryAgentRepository::new()),
            webhooks: Arc::new(InMemoryWebhookRepository::new()),
        }
    }
}
