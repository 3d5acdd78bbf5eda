//! Campaign service
//!
//! Campaign content is editable only in DRAFT. Status moves along
//! `CampaignStatus::can_transition_to`; message delivery happens elsewhere.

use std::sync::Arc;

use shared::error::{AppError, ErrorCode};
use shared::models::{Campaign, CampaignCreate, CampaignStatus, CampaignUpdate, Segment};
use shared::util::snowflake_id;

use super::audit;
use crate::clock::Clock;
use crate::db::{
    AuditRepository, CampaignRepository, PatientRepository, Repositories, SegmentRepository,
};
use crate::error::ServiceResult;

fn invalid_transition(from: CampaignStatus, to: CampaignStatus) -> AppError {
    AppError::with_message(
        ErrorCode::InvalidCampaignTransition,
        format!("Cannot move campaign from {} to {}", from.as_db(), to.as_db()),
    )
    .with_detail("from", from.as_db())
    .with_detail("to", to.as_db())
}

#[derive(Clone)]
pub struct CampaignService {
    campaigns: Arc<dyn CampaignRepository>,
    segments: Arc<dyn SegmentRepository>,
    patients: Arc<dyn PatientRepository>,
    audit: Arc<dyn AuditRepository>,
    clock: Arc<dyn Clock>,
}

impl CampaignService {
    pub fn new(repos: &Repositories, clock: Arc<dyn Clock>) -> Self {
        Self {
            campaigns: repos.campaigns.clone(),
            segments: repos.segments.clone(),
            patients: repos.patients.clone(),
            audit: repos.audit.clone(),
            clock,
        }
    }

    /// Segment that exists and is active
    async fn usable_segment(&self, tenant_id: &str, segment_id: i64) -> ServiceResult<Segment> {
        let segment = self
            .segments
            .find_segment(tenant_id, segment_id)
            .await?
            .ok_or_else(|| {
                AppError::new(ErrorCode::SegmentNotFound).with_detail("segment_id", segment_id)
            })?;
        if !segment.is_active {
            return Err(AppError::new(ErrorCode::SegmentInactive)
                .with_detail("segment_id", segment_id)
                .into());
        }
        Ok(segment)
    }

    pub async fn create_campaign(
        &self,
        tenant_id: &str,
        data: CampaignCreate,
    ) -> ServiceResult<Campaign> {
        if data.name.trim().is_empty() {
            return Err(AppError::validation("Campaign name is required").into());
        }
        self.usable_segment(tenant_id, data.segment_id).await?;

        let now = self.clock.now_millis();
        let campaign = Campaign {
            id: snowflake_id(),
            tenant_id: tenant_id.to_string(),
            segment_id: data.segment_id,
            name: data.name.trim().to_string(),
            channel: data.channel,
            subject: data.subject,
            message: data.message,
            status: CampaignStatus::Draft,
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            audience_size: None,
            created_at: now,
            updated_at: now,
        };
        self.campaigns.insert_campaign(&campaign).await?;
        Ok(campaign)
    }

    pub async fn get_campaign(&self, tenant_id: &str, id: i64) -> ServiceResult<Option<Campaign>> {
        Ok(self.campaigns.find_campaign(tenant_id, id).await?)
    }

    pub async fn list_campaigns(
        &self,
        tenant_id: &str,
        status: Option<CampaignStatus>,
    ) -> ServiceResult<Vec<Campaign>> {
        Ok(self.campaigns.list_campaigns(tenant_id, status).await?)
    }

    pub async fn update_campaign(
        &self,
        tenant_id: &str,
        id: i64,
        data: CampaignUpdate,
    ) -> ServiceResult<Option<Campaign>> {
        let Some(mut campaign) = self.campaigns.find_campaign(tenant_id, id).await? else {
            return Ok(None);
        };
        if campaign.status != CampaignStatus::Draft {
            return Err(AppError::new(ErrorCode::CampaignNotEditable)
                .with_detail("status", campaign.status.as_db())
                .into());
        }

        if let Some(segment_id) = data.segment_id {
            if segment_id != campaign.segment_id {
                self.usable_segment(tenant_id, segment_id).await?;
            }
            campaign.segment_id = segment_id;
        }
        if let Some(name) = data.name {
            if name.trim().is_empty() {
                return Err(AppError::validation("Campaign name is required").into());
            }
            campaign.name = name.trim().to_string();
        }
        if let Some(channel) = data.channel {
            campaign.channel = channel;
        }
        if let Some(subject) = data.subject {
            campaign.subject = Some(subject);
        }
        if let Some(message) = data.message {
            campaign.message = message;
        }
        campaign.updated_at = self.clock.now_millis();

        if !self.campaigns.replace_campaign(&campaign).await? {
            return Ok(None);
        }
        Ok(Some(campaign))
    }

    /// Only DRAFT and CANCELLED campaigns can be deleted
    pub async fn delete_campaign(&self, tenant_id: &str, id: i64) -> ServiceResult<bool> {
        let Some(campaign) = self.campaigns.find_campaign(tenant_id, id).await? else {
            return Ok(false);
        };
        if !matches!(
            campaign.status,
            CampaignStatus::Draft | CampaignStatus::Cancelled
        ) {
            return Err(AppError::new(ErrorCode::CampaignNotEditable)
                .with_detail("status", campaign.status.as_db())
                .into());
        }
        Ok(self.campaigns.delete_campaign(tenant_id, id).await?)
    }

    /// DRAFT → SCHEDULED at a future `scheduled_at`
    pub async fn schedule(
        &self,
        tenant_id: &str,
        id: i64,
        scheduled_at: i64,
    ) -> ServiceResult<Option<Campaign>> {
        if scheduled_at <= self.clock.now_millis() {
            return Err(AppError::new(ErrorCode::ScheduleInPast).into());
        }
        self.transition(tenant_id, id, CampaignStatus::Scheduled, |c, _| {
            c.scheduled_at = Some(scheduled_at);
        })
        .await
    }

    /// DRAFT | SCHEDULED → SENDING, freezing the audience size
    pub async fn start_sending(&self, tenant_id: &str, id: i64) -> ServiceResult<Option<Campaign>> {
        let Some(campaign) = self.campaigns.find_campaign(tenant_id, id).await? else {
            return Ok(None);
        };
        if !campaign.status.can_transition_to(CampaignStatus::Sending) {
            return Err(invalid_transition(campaign.status, CampaignStatus::Sending).into());
        }
        let segment = self.usable_segment(tenant_id, campaign.segment_id).await?;
        let audience = self
            .patients
            .query_audience(tenant_id, &segment.filters, self.clock.now_millis(), 0)
            .await?;

        self.transition(tenant_id, id, CampaignStatus::Sending, |c, now| {
            c.started_at = Some(now);
            c.audience_size = Some(audience.count);
        })
        .await
    }

    /// SENDING → PAUSED
    pub async fn pause(&self, tenant_id: &str, id: i64) -> ServiceResult<Option<Campaign>> {
        self.transition(tenant_id, id, CampaignStatus::Paused, |_, _| {})
            .await
    }

    /// PAUSED → SENDING
    pub async fn resume(&self, tenant_id: &str, id: i64) -> ServiceResult<Option<Campaign>> {
        let Some(campaign) = self.campaigns.find_campaign(tenant_id, id).await? else {
            return Ok(None);
        };
        if campaign.status != CampaignStatus::Paused {
            return Err(invalid_transition(campaign.status, CampaignStatus::Sending).into());
        }
        self.transition(tenant_id, id, CampaignStatus::Sending, |_, _| {})
            .await
    }

    /// SENDING → COMPLETED
    pub async fn complete(&self, tenant_id: &str, id: i64) -> ServiceResult<Option<Campaign>> {
        self.transition(tenant_id, id, CampaignStatus::Completed, |c, now| {
            c.completed_at = Some(now);
        })
        .await
    }

    /// Any non-terminal status → CANCELLED
    pub async fn cancel(&self, tenant_id: &str, id: i64) -> ServiceResult<Option<Campaign>> {
        self.transition(tenant_id, id, CampaignStatus::Cancelled, |_, _| {})
            .await
    }

    async fn transition<F>(
        &self,
        tenant_id: &str,
        id: i64,
        next: CampaignStatus,
        apply: F,
    ) -> ServiceResult<Option<Campaign>>
    where
        F: FnOnce(&mut Campaign, i64) + Send,
    {
        let Some(mut campaign) = self.campaigns.find_campaign(tenant_id, id).await? else {
            return Ok(None);
        };
        let from = campaign.status;
        if !from.can_transition_to(next) {
            return Err(invalid_transition(from, next).into());
        }

        let now = self.clock.now_millis();
        campaign.status = next;
        campaign.updated_at = now;
        apply(&mut campaign, now);

        if !self.campaigns.replace_campaign(&campaign).await? {
            return Ok(None);
        }

        tracing::info!(
            tenant_id = %tenant_id,
            campaign_id = id,
            from = from.as_db(),
            to = next.as_db(),
            "Campaign status changed"
        );
        let detail = serde_json::json!({
            "campaign_id": id,
            "from": from.as_db(),
            "to": next.as_db(),
        });
        audit(&*self.audit, tenant_id, "campaign_status_changed", Some(detail), now).await;
        Ok(Some(campaign))
    }
}
