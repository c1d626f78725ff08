//! PgEntityStore: entity documents and checkpoints in Postgres.
//!
//! One row per `(kind, key)` holding the JSONB document. A batch commit runs in
//! a single transaction, so entity writes and the checkpoint move together.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use staking_world::LogPosition;
use tracing::debug;

use crate::entities::EntityKind;
use crate::store::{Checkpoint, EntityStore, WriteBatch};

#[derive(Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url)
            .await
            .context("connecting to postgres")?;
        Ok(Self::new(pool))
    }

    /// Create the tables if they don't exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS staking_entities (
                kind        TEXT         NOT NULL,
                key         TEXT         NOT NULL,
                body        JSONB        NOT NULL,
                updated_at  TIMESTAMPTZ  NOT NULL DEFAULT now(),
                PRIMARY KEY (kind, key)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS staking_entities_user_idx \
             ON staking_entities (kind, (body->>'user'))",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS staking_checkpoints (
                name          TEXT         PRIMARY KEY,
                block_number  BIGINT       NOT NULL,
                log_index     BIGINT       NOT NULL,
                updated_at    TIMESTAMPTZ  NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn load_raw(&self, kind: EntityKind, key: &str) -> Result<Option<serde_json::Value>> {
        let row = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT body FROM staking_entities WHERE kind = $1 AND key = $2",
        )
        .bind(kind.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(body,)| body))
    }

    async fn scan_by_user(&self, kind: EntityKind, user: &str) -> Result<Vec<serde_json::Value>> {
        let rows = sqlx::query_as::<_, (serde_json::Value,)>(
            r#"
            SELECT body FROM staking_entities
            WHERE kind = $1 AND body->>'user' = $2
            ORDER BY key ASC
            "#,
        )
        .bind(kind.as_str())
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(body,)| body).collect())
    }

    async fn checkpoint(&self, name: &str) -> Result<Option<Checkpoint>> {
        let row = sqlx::query_as::<_, (i64, i64, DateTime<Utc>)>(
            "SELECT block_number, log_index, updated_at FROM staking_checkpoints WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(block_number, log_index, updated_at)| {
            Ok(Checkpoint {
                name: name.to_string(),
                position: LogPosition::new(
                    u64::try_from(block_number).context("negative block_number in checkpoint")?,
                    u64::try_from(log_index).context("negative log_index in checkpoint")?,
                ),
                updated_at,
            })
        })
        .transpose()
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for write in &batch.writes {
            sqlx::query(
                r#"
                INSERT INTO staking_entities (kind, key, body, updated_at)
                VALUES ($1, $2, $3, now())
                ON CONFLICT (kind, key) DO UPDATE
                SET body = EXCLUDED.body, updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(write.kind.as_str())
            .bind(&write.key)
            .bind(&write.body)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("upserting {}/{}", write.kind, write.key))?;
        }

        if let Some((name, position)) = &batch.checkpoint {
            sqlx::query(
                r#"
                INSERT INTO staking_checkpoints (name, block_number, log_index, updated_at)
                VALUES ($1, $2, $3, now())
                ON CONFLICT (name) DO UPDATE
                SET block_number = EXCLUDED.block_number,
                    log_index = EXCLUDED.log_index,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(name)
            .bind(i64::try_from(position.block_number).context("block_number exceeds i64")?)
            .bind(i64::try_from(position.log_index).context("log_index exceeds i64")?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            writes = batch.writes.len(),
            checkpoint = ?batch.checkpoint.as_ref().map(|(_, p)| p.to_string()),
            "Committed entity batch"
        );
        Ok(())
    }
}
