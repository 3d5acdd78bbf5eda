use async_trait::async_trait;

use super::PgStore;
use crate::db::{DbResult, WebhookEventRepository};

#[async_trait]
impl WebhookEventRepository for PgStore {
    /// Insert-first; zero rows affected means the event was already recorded
    async fn record_event(&self, event_id: &str, event_type: &str, now: i64) -> DbResult<bool> {
        let result = sqlx::query(
            "INSERT INTO processed_webhook_events (event_id, event_type, processed_at)
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(event_id)
        .bind(event_type)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
