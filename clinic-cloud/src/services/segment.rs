//! Segment service
//!
//! Segments are saved filters, never materialized; every preview runs the
//! filter against live patient data.

use std::sync::Arc;

use shared::error::{AppError, ErrorCode};
use shared::models::{Segment, SegmentCreate, SegmentFilters, SegmentPreview, SegmentUpdate};
use shared::util::snowflake_id;

use super::audit;
use crate::clock::Clock;
use crate::db::{
    AuditRepository, CampaignRepository, PatientRepository, Repositories, SegmentRepository,
};
use crate::error::ServiceResult;

#[derive(Clone)]
pub struct SegmentService {
    segments: Arc<dyn SegmentRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    patients: Arc<dyn PatientRepository>,
    audit: Arc<dyn AuditRepository>,
    clock: Arc<dyn Clock>,
    preview_limit: i64,
}

impl SegmentService {
    pub fn new(repos: &Repositories, clock: Arc<dyn Clock>, preview_limit: i64) -> Self {
        Self {
            segments: repos.segments.clone(),
            campaigns: repos.campaigns.clone(),
            patients: repos.patients.clone(),
            audit: repos.audit.clone(),
            clock,
            preview_limit,
        }
    }

    /// Matching count plus at most `preview_limit` patients
    pub async fn preview_segment(
        &self,
        tenant_id: &str,
        filters: &SegmentFilters,
    ) -> ServiceResult<SegmentPreview> {
        let preview = self
            .patients
            .query_audience(tenant_id, filters, self.clock.now_millis(), self.preview_limit)
            .await?;
        tracing::debug!(tenant_id = %tenant_id, count = preview.count, "Segment preview");
        Ok(preview)
    }

    /// Preview of a saved segment
    pub async fn segment_audience(
        &self,
        tenant_id: &str,
        segment_id: i64,
    ) -> ServiceResult<Option<SegmentPreview>> {
        let Some(segment) = self.segments.find_segment(tenant_id, segment_id).await? else {
            return Ok(None);
        };
        Ok(Some(self.preview_segment(tenant_id, &segment.filters).await?))
    }

    pub async fn create_segment(
        &self,
        tenant_id: &str,
        data: SegmentCreate,
    ) -> ServiceResult<Segment> {
        validate_name(&data.name)?;
        let now = self.clock.now_millis();
        let segment = Segment {
            id: snowflake_id(),
            tenant_id: tenant_id.to_string(),
            name: data.name.trim().to_string(),
            description: data.description,
            filters: data.filters,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.segments.insert_segment(&segment).await?;
        Ok(segment)
    }

    pub async fn get_segment(&self, tenant_id: &str, id: i64) -> ServiceResult<Option<Segment>> {
        Ok(self.segments.find_segment(tenant_id, id).await?)
    }

    pub async fn list_segments(&self, tenant_id: &str) -> ServiceResult<Vec<Segment>> {
        Ok(self.segments.list_segments(tenant_id).await?)
    }

    pub async fn update_segment(
        &self,
        tenant_id: &str,
        id: i64,
        data: SegmentUpdate,
    ) -> ServiceResult<Option<Segment>> {
        let Some(mut segment) = self.segments.find_segment(tenant_id, id).await? else {
            return Ok(None);
        };
        if let Some(name) = data.name {
            validate_name(&name)?;
            segment.name = name.trim().to_string();
        }
        if let Some(description) = data.description {
            segment.description = Some(description);
        }
        if let Some(filters) = data.filters {
            segment.filters = filters;
        }
        if let Some(is_active) = data.is_active {
            segment.is_active = is_active;
        }
        segment.updated_at = self.clock.now_millis();

        if !self.segments.replace_segment(&segment).await? {
            return Ok(None);
        }
        Ok(Some(segment))
    }

    /// Delete a segment; fails with `SegmentInUse` while any campaign that
    /// is neither COMPLETED nor CANCELLED references it.
    pub async fn delete_segment(&self, tenant_id: &str, id: i64) -> ServiceResult<bool> {
        let open = self
            .campaigns
            .count_open_campaigns_for_segment(tenant_id, id)
            .await?;
        if open > 0 {
            return Err(AppError::new(ErrorCode::SegmentInUse)
                .with_detail("segment_id", id)
                .with_detail("open_campaigns", open)
                .into());
        }

        let deleted = self.segments.delete_segment(tenant_id, id).await?;
        if deleted {
            let detail = serde_json::json!({ "segment_id": id });
            audit(
                &*self.audit,
                tenant_id,
                "segment_deleted",
                Some(detail),
                self.clock.now_millis(),
            )
            .await;
        }
        Ok(deleted)
    }
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::validation("Segment name is required"));
    }
    Ok(())
}
