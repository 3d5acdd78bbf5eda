//! Compliance document service
//!
//! Status is derived from the expiration date at write time and refreshed
//! by [`ComplianceService::update_statuses`]; reads never recompute it.
//! PENDING_RENEWAL is only set explicitly and only left through an update
//! that touches the expiration date.

use std::sync::Arc;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    ComplianceDocument, ComplianceDocumentCreate, ComplianceDocumentQuery,
    ComplianceDocumentUpdate, DocumentStatus, StatusCount,
};
use shared::util::{DAY_MS, snowflake_id};

use super::audit;
use crate::clock::Clock;
use crate::db::{AuditRepository, ComplianceRepository, Repositories, UsageRepository};
use crate::error::ServiceResult;

/// A document expiring within this window is EXPIRING_SOON
pub const EXPIRING_SOON_WINDOW_MS: i64 = 30 * DAY_MS;

/// Status for a document with the given expiration date at `now`
pub fn compute_status(expiration_date: Option<i64>, now: i64) -> DocumentStatus {
    match expiration_date {
        None => DocumentStatus::Valid,
        Some(e) if e < now => DocumentStatus::Expired,
        Some(e) if e <= now.saturating_add(EXPIRING_SOON_WINDOW_MS) => DocumentStatus::ExpiringSoon,
        Some(_) => DocumentStatus::Valid,
    }
}

#[derive(Clone)]
pub struct ComplianceService {
    documents: Arc<dyn ComplianceRepository>,
    staff: Arc<dyn UsageRepository>,
    audit: Arc<dyn AuditRepository>,
    clock: Arc<dyn Clock>,
}

impl ComplianceService {
    pub fn new(repos: &Repositories, clock: Arc<dyn Clock>) -> Self {
        Self {
            documents: repos.compliance.clone(),
            staff: repos.usage.clone(),
            audit: repos.audit.clone(),
            clock,
        }
    }

    /// A document may only name a staff member of its own tenant
    async fn require_staff(&self, tenant_id: &str, staff_id: Option<i64>) -> ServiceResult<()> {
        let Some(staff_id) = staff_id else {
            return Ok(());
        };
        if !self.staff.staff_exists(tenant_id, staff_id).await? {
            return Err(AppError::new(ErrorCode::StaffNotFound)
                .with_detail("staff_id", staff_id)
                .into());
        }
        Ok(())
    }

    pub async fn create(
        &self,
        tenant_id: &str,
        data: ComplianceDocumentCreate,
    ) -> ServiceResult<ComplianceDocument> {
        self.require_staff(tenant_id, data.staff_id).await?;
        let now = self.clock.now_millis();
        let doc = ComplianceDocument {
            id: snowflake_id(),
            tenant_id: tenant_id.to_string(),
            staff_id: data.staff_id,
            name: data.name,
            document_type: data.document_type,
            issue_date: data.issue_date,
            expiration_date: data.expiration_date,
            status: compute_status(data.expiration_date, now),
            renewal_started_at: None,
            file_url: data.file_url,
            file_size: data.file_size,
            mime_type: data.mime_type,
            notes: data.notes,
            created_at: now,
            updated_at: now,
        };
        self.documents.insert_document(&doc).await?;

        let detail = serde_json::json!({ "document_id": doc.id, "name": doc.name });
        audit(&*self.audit, tenant_id, "compliance_document_created", Some(detail), now).await;
        tracing::debug!(tenant_id = %tenant_id, document_id = doc.id, status = doc.status.as_db(), "Compliance document created");
        Ok(doc)
    }

    pub async fn get(&self, tenant_id: &str, id: i64) -> ServiceResult<Option<ComplianceDocument>> {
        Ok(self.documents.find_document(tenant_id, id).await?)
    }

    pub async fn list(
        &self,
        tenant_id: &str,
        query: &ComplianceDocumentQuery,
    ) -> ServiceResult<Vec<ComplianceDocument>> {
        Ok(self.documents.list_documents(tenant_id, query).await?)
    }

    /// Partial update. Status is recomputed only when `expiration_date` is
    /// present in the payload (set or cleared), including from PENDING_RENEWAL.
    pub async fn update(
        &self,
        tenant_id: &str,
        id: i64,
        data: ComplianceDocumentUpdate,
    ) -> ServiceResult<Option<ComplianceDocument>> {
        let Some(mut doc) = self.documents.find_document(tenant_id, id).await? else {
            return Ok(None);
        };
        let now = self.clock.now_millis();

        if let Some(staff_id) = data.staff_id {
            self.require_staff(tenant_id, staff_id).await?;
            doc.staff_id = staff_id;
        }
        if let Some(v) = data.name {
            doc.name = v;
        }
        if let Some(v) = data.document_type {
            doc.document_type = v;
        }
        if let Some(v) = data.issue_date {
            doc.issue_date = v;
        }
        if let Some(v) = data.file_url {
            doc.file_url = v;
        }
        if let Some(v) = data.file_size {
            doc.file_size = v;
        }
        if let Some(v) = data.mime_type {
            doc.mime_type = v;
        }
        if let Some(v) = data.notes {
            doc.notes = v;
        }
        if let Some(expiration) = data.expiration_date {
            doc.expiration_date = expiration;
            doc.status = compute_status(expiration, now);
        }
        doc.updated_at = now;

        if !self.documents.replace_document(&doc).await? {
            return Ok(None);
        }
        Ok(Some(doc))
    }

    pub async fn delete(&self, tenant_id: &str, id: i64) -> ServiceResult<bool> {
        let deleted = self.documents.delete_document(tenant_id, id).await?;
        if deleted {
            let detail = serde_json::json!({ "document_id": id });
            audit(
                &*self.audit,
                tenant_id,
                "compliance_document_deleted",
                Some(detail),
                self.clock.now_millis(),
            )
            .await;
        }
        Ok(deleted)
    }

    /// Force PENDING_RENEWAL and stamp `renewal_started_at`; the expiration
    /// date is left as is.
    pub async fn start_renewal(
        &self,
        tenant_id: &str,
        id: i64,
    ) -> ServiceResult<Option<ComplianceDocument>> {
        let Some(mut doc) = self.documents.find_document(tenant_id, id).await? else {
            return Ok(None);
        };
        let now = self.clock.now_millis();
        doc.status = DocumentStatus::PendingRenewal;
        doc.renewal_started_at = Some(now);
        doc.updated_at = now;

        if !self.documents.replace_document(&doc).await? {
            return Ok(None);
        }

        tracing::info!(tenant_id = %tenant_id, document_id = id, "Compliance document renewal started");
        let detail = serde_json::json!({ "document_id": id });
        audit(&*self.audit, tenant_id, "compliance_renewal_started", Some(detail), now).await;
        Ok(Some(doc))
    }

    /// Recompute every non-PENDING_RENEWAL document and persist the ones
    /// whose status changed. Returns the number of rows written.
    ///
    /// Rows are written one at a time without a surrounding transaction; a
    /// failure part-way leaves earlier rows updated and the call can be
    /// repeated.
    pub async fn update_statuses(&self, tenant_id: &str) -> ServiceResult<u64> {
        let now = self.clock.now_millis();
        let candidates = self.documents.list_recompute_candidates(tenant_id).await?;

        let mut changed = 0u64;
        for doc in candidates {
            let status = compute_status(doc.expiration_date, now);
            if status == doc.status {
                continue;
            }
            if self
                .documents
                .set_document_status(tenant_id, doc.id, status, now)
                .await?
            {
                changed += 1;
            }
        }

        if changed > 0 {
            tracing::info!(tenant_id = %tenant_id, changed, "Compliance statuses recomputed");
        }
        Ok(changed)
    }

    /// Document count for every status, zeros included
    pub async fn status_summary(&self, tenant_id: &str) -> ServiceResult<Vec<StatusCount>> {
        let counts = self.documents.count_documents_by_status(tenant_id).await?;
        Ok(DocumentStatus::ALL
            .iter()
            .map(|status| StatusCount {
                status: status.as_db().to_string(),
                count: counts
                    .iter()
                    .find(|c| c.status == status.as_db())
                    .map_or(0, |c| c.count),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_773_576_000_000;

    #[test]
    fn test_no_expiration_is_valid() {
        assert_eq!(compute_status(None, NOW), DocumentStatus::Valid);
    }

    #[test]
    fn test_status_boundaries() {
        assert_eq!(compute_status(Some(NOW - 1), NOW), DocumentStatus::Expired);
        assert_eq!(compute_status(Some(NOW), NOW), DocumentStatus::ExpiringSoon);
        assert_eq!(
            compute_status(Some(NOW + EXPIRING_SOON_WINDOW_MS), NOW),
            DocumentStatus::ExpiringSoon
        );
        assert_eq!(
            compute_status(Some(NOW + EXPIRING_SOON_WINDOW_MS + 1), NOW),
            DocumentStatus::Valid
        );
    }

    #[test]
    fn test_status_sweep_over_offsets() {
        for days in -40i64..=40 {
            let e = NOW + days * DAY_MS;
            let expected = if days < 0 {
                DocumentStatus::Expired
            } else if days <= 30 {
                DocumentStatus::ExpiringSoon
            } else {
                DocumentStatus::Valid
            };
            assert_eq!(compute_status(Some(e), NOW), expected, "offset {days} days");
        }
    }
}
