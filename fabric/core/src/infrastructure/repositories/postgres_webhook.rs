// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL `WebhookRepository` over the `webhooks` table.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::notification::Webhook;
use crate::domain::repository::{RepositoryError, WebhookRepository};

pub struct PostgresWebhookRepository {
    pool: PgPool,
}

impl PostgresWebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookRepository for PostgresWebhookRepository {
    async fn save(&self, webhook: &Webhook) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO webhooks (topic, url)
            VALUES ($1, $2)
            ON CONFLICT (topic, url) DO NOTHING
            "#,
        )
        .bind(&webhook.topic)
        .bind(&webhook.url)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save webhook: {}", e)))?;
        Ok(())
    }

    async fn list_by_topic(&self, topic: &str) -> Result<Vec<Webhook>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT topic, url
            FROM webhooks
            WHERE topic = $1
            ORDER BY created_at, url
            "#,
        )
        .bind(topic)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(RepositoryError::NotFound(format!("webhooks for topic {}", topic)));
        }

        rows.iter()
            .map(|row| -> Result<Webhook, RepositoryError> {
                Ok(Webhook {
                    topic: row.try_get("topic")?,
                    url: row.try_get("url")?,
                })
            })
            .collect()
    }

    async fn delete(&self, webhook: &Webhook) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM webhooks WHERE topic = $1 AND url = $2")
            .bind(&webhook.topic)
            .bind(&webhook.url)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
