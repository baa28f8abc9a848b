// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Agent Repository
//!
//! `AgentRepository` backed by the `agents` table via `sqlx`. The status is
//! stored as its wire string (`RUNNING`, `TERMINATED`, ...).

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::agent::{Agent, AgentStatus};
use crate::domain::repository::{AgentRepository, RepositoryError};

pub struct PostgresAgentRepository {
    pool: PgPool,
}

impl PostgresAgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn agent_from_row(row: &PgRow) -> Result<Agent, RepositoryError> {
    let status_str: String = row.try_get("status")?;
    let status = status_str
        .parse::<AgentStatus>()
        .map_err(RepositoryError::Serialization)?;

    Ok(Agent {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        pid: row.try_get("pid")?,
        status,
        public_did: row.try_get("public_did")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl AgentRepository for PostgresAgentRepository {
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO agents (id, name, pid, status, public_did, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                pid = EXCLUDED.pid,
                status = EXCLUDED.status,
                public_did = EXCLUDED.public_did,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&agent.id)
        .bind(&agent.name)
        .bind(&agent.pid)
        .bind(agent.status.as_str())
        .bind(agent.public_did)
        .bind(agent.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save agent: {}", e)))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Agent>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, pid, status, public_did, updated_at
            FROM agents
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(agent_from_row).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Agent>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, pid, status, public_did, updated_at
            FROM agents
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(agent_from_row).collect()
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM agents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
