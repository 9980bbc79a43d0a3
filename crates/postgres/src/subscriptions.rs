use async_trait::async_trait;
use engine_core::{Error, Result, SubscriptionInfo, SubscriptionSource};
use sqlx::PgPool;

/// Subscription tiers from `organization_subscriptions`.
#[derive(Clone)]
pub struct PgSubscriptionSource {
    pool: PgPool,
}

impl PgSubscriptionSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionSource for PgSubscriptionSource {
    async fn subscription(&self, organization: &str) -> Result<Option<SubscriptionInfo>> {
        let row: Option<(i64, i32)> = sqlx::query_as(
            r#"
            SELECT monthly_event_limit, months_of_history
            FROM organization_subscriptions
            WHERE organization_id = $1
            "#,
        )
        .bind(organization)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::database(format!("Subscription lookup error: {}", e)))?;

        Ok(row.map(|(limit, months)| SubscriptionInfo {
            monthly_event_limit: limit.max(0) as u64,
            months_of_history: months.max(0) as u32,
        }))
    }
}
