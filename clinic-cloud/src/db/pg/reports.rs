use async_trait::async_trait;
use shared::models::StatusCount;

use super::{PgStore, StatusCountRow};
use crate::db::{DbResult, ReportRepository};

#[async_trait]
impl ReportRepository for PgStore {
    async fn appointment_counts_by_status(
        &self,
        tenant_id: &str,
        from: i64,
        to: i64,
    ) -> DbResult<Vec<StatusCount>> {
        let rows: Vec<StatusCountRow> = sqlx::query_as(
            "SELECT status, COUNT(*) AS count FROM appointments
             WHERE tenant_id = $1 AND start_at >= $2 AND start_at < $3
             GROUP BY status ORDER BY status",
        )
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(StatusCount::from).collect())
    }

    async fn count_new_patients(&self, tenant_id: &str, from: i64, to: i64) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM patients
             WHERE tenant_id = $1 AND created_at >= $2 AND created_at < $3",
        )
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn campaign_counts_by_status(&self, tenant_id: &str) -> DbResult<Vec<StatusCount>> {
        let rows: Vec<StatusCountRow> = sqlx::query_as(
            "SELECT status, COUNT(*) AS count FROM campaigns
             WHERE tenant_id = $1 GROUP BY status ORDER BY status",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(StatusCount::from).collect())
    }
}
