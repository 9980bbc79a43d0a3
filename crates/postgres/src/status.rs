//! Import status persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_core::{
    Error, ImportJob, ImportRecord, ImportStatus, Result, SiteId, StatusKind, StatusStore,
};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct ImportStatusRow {
    import_id: Uuid,
    site_id: i32,
    organization_id: String,
    platform: String,
    status: String,
    error_message: Option<String>,
    imported_events: i64,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ImportStatusRow> for ImportRecord {
    type Error = Error;

    fn try_from(row: ImportStatusRow) -> Result<Self> {
        let status = match StatusKind::parse(&row.status) {
            Some(StatusKind::Pending) => ImportStatus::Pending,
            Some(StatusKind::Processing) => ImportStatus::Processing,
            Some(StatusKind::Completed) => ImportStatus::Completed,
            Some(StatusKind::Failed) => ImportStatus::failed(row.error_message.unwrap_or_default()),
            None => {
                return Err(Error::database(format!(
                    "Unknown import status: {}",
                    row.status
                )))
            }
        };

        Ok(Self {
            import_id: row.import_id,
            site: row.site_id as SiteId,
            organization: row.organization_id,
            platform: row.platform,
            status,
            imported_events: row.imported_events.max(0) as u64,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

/// [`StatusStore`] over the `import_status` table.
///
/// Status updates are guarded in SQL so a completed or failed import is
/// never moved again.
#[derive(Clone)]
pub struct PgStatusStore {
    pool: PgPool,
}

impl PgStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatusStore for PgStatusStore {
    async fn create_pending(&self, job: &ImportJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO import_status (import_id, site_id, organization_id, platform, status)
            VALUES ($1, $2, $3, $4, 'pending')
            ON CONFLICT (import_id) DO NOTHING
            "#,
        )
        .bind(job.import_id)
        .bind(job.site as i32)
        .bind(&job.organization)
        .bind(&job.platform)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::database(format!("Create import status error: {}", e)))?;

        Ok(())
    }

    async fn create_pending_within_limit(
        &self,
        job: &ImportJob,
        active: &[StatusKind],
        limit: u64,
    ) -> Result<bool> {
        let statuses: Vec<String> = active.iter().map(|s| s.as_str().to_string()).collect();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::database(format!("Begin admission transaction error: {}", e)))?;

        // Serializes admissions per organization until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&job.organization)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::database(format!("Admission lock error: {}", e)))?;

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM import_status WHERE organization_id = $1 AND status = ANY($2)",
        )
        .bind(&job.organization)
        .bind(&statuses)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::database(format!("Count active imports error: {}", e)))?;

        if count.max(0) as u64 >= limit {
            debug!(
                organization_id = %job.organization,
                active = count,
                limit = limit,
                "Pending row not created: concurrent limit reached"
            );
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO import_status (import_id, site_id, organization_id, platform, status)
            VALUES ($1, $2, $3, $4, 'pending')
            ON CONFLICT (import_id) DO NOTHING
            "#,
        )
        .bind(job.import_id)
        .bind(job.site as i32)
        .bind(&job.organization)
        .bind(&job.platform)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::database(format!("Create import status error: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| Error::database(format!("Commit admission transaction error: {}", e)))?;

        Ok(true)
    }

    async fn update_status(&self, import_id: Uuid, status: &ImportStatus) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE import_status
            SET status = $2,
                error_message = $3,
                completed_at = CASE WHEN $4 THEN now() ELSE completed_at END
            WHERE import_id = $1
              AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(import_id)
        .bind(status.kind().as_str())
        .bind(status.reason())
        .bind(status.is_terminal())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::database(format!("Update import status error: {}", e)))?;

        if result.rows_affected() == 0 {
            debug!(
                import_id = %import_id,
                status = status.kind().as_str(),
                "Status update ignored: import missing or already terminal"
            );
        }

        Ok(())
    }

    async fn update_progress(&self, import_id: Uuid, delta: u64) -> Result<()> {
        sqlx::query(
            "UPDATE import_status SET imported_events = imported_events + $2 WHERE import_id = $1",
        )
        .bind(import_id)
        .bind(delta as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::database(format!("Update import progress error: {}", e)))?;

        Ok(())
    }

    async fn count_active(&self, organization: &str, statuses: &[StatusKind]) -> Result<u64> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM import_status WHERE organization_id = $1 AND status = ANY($2)",
        )
        .bind(organization)
        .bind(&statuses)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::database(format!("Count imports error: {}", e)))?;

        Ok(count.max(0) as u64)
    }

    async fn get(&self, import_id: Uuid) -> Result<Option<ImportRecord>> {
        let row = sqlx::query_as::<_, ImportStatusRow>(
            r#"
            SELECT import_id, site_id, organization_id, platform, status, error_message,
                   imported_events, started_at, completed_at
            FROM import_status
            WHERE import_id = $1
            "#,
        )
        .bind(import_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::database(format!("Get import status error: {}", e)))?;

        row.map(ImportRecord::try_from).transpose()
    }
}
