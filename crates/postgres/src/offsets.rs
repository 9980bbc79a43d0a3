//! Queue consumer positions.

use async_trait::async_trait;
use engine_core::{Error, OffsetStore, Result};
use sqlx::PgPool;
use tracing::debug;

/// [`OffsetStore`] over the `queue_offsets` table.
#[derive(Clone)]
pub struct PgOffsetStore {
    pool: PgPool,
}

impl PgOffsetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OffsetStore for PgOffsetStore {
    async fn load(&self, topic: &str, partition: i32) -> Result<Option<i64>> {
        sqlx::query_scalar(
            "SELECT next_offset FROM queue_offsets WHERE topic = $1 AND partition_id = $2",
        )
        .bind(topic)
        .bind(partition)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::database(format!("Load queue offset error: {}", e)))
    }

    async fn save(&self, topic: &str, partition: i32, next_offset: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO queue_offsets (topic, partition_id, next_offset)
            VALUES ($1, $2, $3)
            ON CONFLICT (topic, partition_id) DO UPDATE
            SET next_offset = GREATEST(queue_offsets.next_offset, EXCLUDED.next_offset),
                updated_at = now()
            "#,
        )
        .bind(topic)
        .bind(partition)
        .bind(next_offset)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::database(format!("Save queue offset error: {}", e)))?;

        debug!(topic = topic, partition = partition, next_offset = next_offset, "Saved queue offset");
        Ok(())
    }
}
