use async_trait::async_trait;
use shared::models::{Campaign, CampaignChannel, CampaignStatus};

use super::{PgStore, unknown_status};
use crate::BoxError;
use crate::db::{CampaignRepository, DbResult};

#[derive(sqlx::FromRow)]
struct CampaignRow {
    id: i64,
    tenant_id: String,
    segment_id: i64,
    name: String,
    channel: String,
    subject: Option<String>,
    message: String,
    status: String,
    scheduled_at: Option<i64>,
    started_at: Option<i64>,
    completed_at: Option<i64>,
    audience_size: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = BoxError;

    fn try_from(r: CampaignRow) -> Result<Self, Self::Error> {
        let status = CampaignStatus::from_db(&r.status)
            .ok_or_else(|| unknown_status("campaign", &r.status))?;
        let channel = CampaignChannel::from_db(&r.channel)
            .ok_or_else(|| format!("unknown campaign channel in database: {}", r.channel))?;
        Ok(Campaign {
            id: r.id,
            tenant_id: r.tenant_id,
            segment_id: r.segment_id,
            name: r.name,
            channel,
            subject: r.subject,
            message: r.message,
            status,
            scheduled_at: r.scheduled_at,
            started_at: r.started_at,
            completed_at: r.completed_at,
            audience_size: r.audience_size,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const CAMPAIGN_COLUMNS: &str = "id, tenant_id, segment_id, name, channel, subject, message, \
    status, scheduled_at, started_at, completed_at, audience_size, created_at, updated_at";

#[async_trait]
impl CampaignRepository for PgStore {
    async fn insert_campaign(&self, c: &Campaign) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO campaigns (id, tenant_id, segment_id, name, channel, subject, message,
                status, scheduled_at, started_at, completed_at, audience_size, created_at,
                updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(c.id)
        .bind(&c.tenant_id)
        .bind(c.segment_id)
        .bind(&c.name)
        .bind(c.channel.as_db())
        .bind(&c.subject)
        .bind(&c.message)
        .bind(c.status.as_db())
        .bind(c.scheduled_at)
        .bind(c.started_at)
        .bind(c.completed_at)
        .bind(c.audience_size)
        .bind(c.created_at)
        .bind(c.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_campaign(&self, tenant_id: &str, id: i64) -> DbResult<Option<Campaign>> {
        let row: Option<CampaignRow> = sqlx::query_as(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Campaign::try_from).transpose()
    }

    async fn list_campaigns(
        &self,
        tenant_id: &str,
        status: Option<CampaignStatus>,
    ) -> DbResult<Vec<Campaign>> {
        let rows: Vec<CampaignRow> = sqlx::query_as(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns
             WHERE tenant_id = $1 AND ($2::TEXT IS NULL OR status = $2)
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(tenant_id)
        .bind(status.map(|s| s.as_db()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Campaign::try_from).collect()
    }

    async fn replace_campaign(&self, c: &Campaign) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE campaigns SET segment_id = $3, name = $4, channel = $5, subject = $6,
                message = $7, status = $8, scheduled_at = $9, started_at = $10,
                completed_at = $11, audience_size = $12, updated_at = $13
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(&c.tenant_id)
        .bind(c.id)
        .bind(c.segment_id)
        .bind(&c.name)
        .bind(c.channel.as_db())
        .bind(&c.subject)
        .bind(&c.message)
        .bind(c.status.as_db())
        .bind(c.scheduled_at)
        .bind(c.started_at)
        .bind(c.completed_at)
        .bind(c.audience_size)
        .bind(c.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_campaign(&self, tenant_id: &str, id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM campaigns WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_open_campaigns_for_segment(
        &self,
        tenant_id: &str,
        segment_id: i64,
    ) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM campaigns
             WHERE tenant_id = $1 AND segment_id = $2 AND status NOT IN ($3, $4)",
        )
        .bind(tenant_id)
        .bind(segment_id)
        .bind(CampaignStatus::Completed.as_db())
        .bind(CampaignStatus::Cancelled.as_db())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
