use async_trait::async_trait;

use super::PgStore;
use crate::db::{AuditRepository, DbResult};

#[async_trait]
impl AuditRepository for PgStore {
    async fn append_audit(
        &self,
        tenant_id: &str,
        action: &str,
        detail: Option<&serde_json::Value>,
        now: i64,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO audit_logs (tenant_id, action, detail, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(tenant_id)
        .bind(action)
        .bind(detail)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
