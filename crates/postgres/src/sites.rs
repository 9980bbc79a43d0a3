use async_trait::async_trait;
use engine_core::{Error, OrganizationId, Result, SiteDirectory, SiteId};
use sqlx::PgPool;

/// Site ownership from the `sites` table.
#[derive(Clone)]
pub struct PgSiteDirectory {
    pool: PgPool,
}

impl PgSiteDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SiteDirectory for PgSiteDirectory {
    async fn organization_for_site(&self, site: SiteId) -> Result<Option<OrganizationId>> {
        sqlx::query_scalar::<_, String>("SELECT organization_id FROM sites WHERE site_id = $1")
            .bind(site as i32)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::database(format!("Site lookup error: {}", e)))
    }

    async fn sites_for_organization(&self, organization: &str) -> Result<Vec<SiteId>> {
        let ids: Vec<i32> = sqlx::query_scalar(
            "SELECT site_id FROM sites WHERE organization_id = $1 ORDER BY site_id",
        )
        .bind(organization)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::database(format!("Site listing error: {}", e)))?;

        Ok(ids.into_iter().map(|id| id as SiteId).collect())
    }
}
