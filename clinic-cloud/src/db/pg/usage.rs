use async_trait::async_trait;

use super::PgStore;
use crate::db::{DbResult, UsageRepository};

#[async_trait]
impl UsageRepository for PgStore {
    async fn count_active_users(&self, tenant_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE tenant_id = $1 AND is_active = TRUE")
                .bind(tenant_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn staff_exists(&self, tenant_id: &str, staff_id: i64) -> DbResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE tenant_id = $1 AND id = $2)",
        )
        .bind(tenant_id)
        .bind(staff_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn count_appointments_created_between(
        &self,
        tenant_id: &str,
        from: i64,
        to: i64,
    ) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM appointments
             WHERE tenant_id = $1 AND created_at >= $2 AND created_at < $3",
        )
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
