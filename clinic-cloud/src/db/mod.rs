//! Tenant-scoped resource store
//!
//! One trait per resource. Every method that touches business data takes
//! the owning `tenant_id` first and never reads or writes another tenant's
//! rows. `PgStore` is the production implementation, `MemoryStore` backs
//! tests and local experiments.

pub mod memory;
pub mod pg;
pub mod query_builder;

pub use memory::MemoryStore;
pub use pg::PgStore;

use std::sync::Arc;

use async_trait::async_trait;
use shared::models::{
    Campaign, CampaignStatus, ComplianceDocument, ComplianceDocumentQuery, DocumentStatus, Plan,
    Segment, SegmentFilters, SegmentPreview, StatusCount, Subscription, SubscriptionStatus,
    Tenant, TenantStatus,
};

use crate::BoxError;

/// Result type for store operations
pub type DbResult<T> = Result<T, BoxError>;

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn create_tenant(&self, tenant: &Tenant) -> DbResult<()>;
    async fn find_tenant(&self, tenant_id: &str) -> DbResult<Option<Tenant>>;
    async fn find_tenant_by_billing_customer(&self, customer_id: &str)
    -> DbResult<Option<Tenant>>;
    async fn set_billing_customer(&self, tenant_id: &str, customer_id: &str) -> DbResult<()>;
    async fn update_tenant_status(&self, tenant_id: &str, status: TenantStatus) -> DbResult<()>;
    /// All tenant ids (background sweeps)
    async fn list_tenant_ids(&self) -> DbResult<Vec<String>>;
}

#[async_trait]
pub trait ComplianceRepository: Send + Sync {
    async fn insert_document(&self, doc: &ComplianceDocument) -> DbResult<()>;
    async fn find_document(&self, tenant_id: &str, id: i64)
    -> DbResult<Option<ComplianceDocument>>;
    async fn list_documents(
        &self,
        tenant_id: &str,
        query: &ComplianceDocumentQuery,
    ) -> DbResult<Vec<ComplianceDocument>>;
    /// Overwrite every mutable column; `false` if the row does not exist
    async fn replace_document(&self, doc: &ComplianceDocument) -> DbResult<bool>;
    async fn delete_document(&self, tenant_id: &str, id: i64) -> DbResult<bool>;
    /// Documents whose status is not PENDING_RENEWAL
    async fn list_recompute_candidates(&self, tenant_id: &str)
    -> DbResult<Vec<ComplianceDocument>>;
    async fn set_document_status(
        &self,
        tenant_id: &str,
        id: i64,
        status: DocumentStatus,
        now: i64,
    ) -> DbResult<bool>;
    async fn count_documents_by_status(&self, tenant_id: &str) -> DbResult<Vec<StatusCount>>;
    /// Sum of `file_size` over the tenant's documents, in bytes
    async fn total_file_bytes(&self, tenant_id: &str) -> DbResult<i64>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn find_subscription(&self, tenant_id: &str) -> DbResult<Option<Subscription>>;
    /// Insert or replace the tenant's single subscription
    async fn upsert_subscription(&self, sub: &Subscription) -> DbResult<()>;
    async fn update_subscription_status(
        &self,
        tenant_id: &str,
        status: SubscriptionStatus,
        now: i64,
    ) -> DbResult<bool>;
    async fn find_tenant_by_provider_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> DbResult<Option<String>>;
    async fn find_plan(&self, plan_id: &str) -> DbResult<Option<Plan>>;
    async fn list_plans(&self) -> DbResult<Vec<Plan>>;
}

#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn count_active_users(&self, tenant_id: &str) -> DbResult<i64>;
    /// Staff user `staff_id` belongs to `tenant_id`, active or not
    async fn staff_exists(&self, tenant_id: &str, staff_id: i64) -> DbResult<bool>;
    /// Appointments with `from <= created_at < to`
    async fn count_appointments_created_between(
        &self,
        tenant_id: &str,
        from: i64,
        to: i64,
    ) -> DbResult<i64>;
}

#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn count_active_patients(&self, tenant_id: &str) -> DbResult<i64>;
    /// Evaluate `filters` against the tenant's active patients: total
    /// matches plus the first `limit` ordered by last name, first name.
    async fn query_audience(
        &self,
        tenant_id: &str,
        filters: &SegmentFilters,
        now: i64,
        limit: i64,
    ) -> DbResult<SegmentPreview>;
}

#[async_trait]
pub trait SegmentRepository: Send + Sync {
    async fn insert_segment(&self, segment: &Segment) -> DbResult<()>;
    async fn find_segment(&self, tenant_id: &str, id: i64) -> DbResult<Option<Segment>>;
    async fn list_segments(&self, tenant_id: &str) -> DbResult<Vec<Segment>>;
    async fn replace_segment(&self, segment: &Segment) -> DbResult<bool>;
    async fn delete_segment(&self, tenant_id: &str, id: i64) -> DbResult<bool>;
}

#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn insert_campaign(&self, campaign: &Campaign) -> DbResult<()>;
    async fn find_campaign(&self, tenant_id: &str, id: i64) -> DbResult<Option<Campaign>>;
    async fn list_campaigns(
        &self,
        tenant_id: &str,
        status: Option<CampaignStatus>,
    ) -> DbResult<Vec<Campaign>>;
    async fn replace_campaign(&self, campaign: &Campaign) -> DbResult<bool>;
    async fn delete_campaign(&self, tenant_id: &str, id: i64) -> DbResult<bool>;
    /// Campaigns referencing the segment that are not COMPLETED or CANCELLED
    async fn count_open_campaigns_for_segment(
        &self,
        tenant_id: &str,
        segment_id: i64,
    ) -> DbResult<i64>;
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Appointments with `from <= start_at < to`, grouped by status
    async fn appointment_counts_by_status(
        &self,
        tenant_id: &str,
        from: i64,
        to: i64,
    ) -> DbResult<Vec<StatusCount>>;
    /// Patients with `from <= created_at < to`
    async fn count_new_patients(&self, tenant_id: &str, from: i64, to: i64) -> DbResult<i64>;
    async fn campaign_counts_by_status(&self, tenant_id: &str) -> DbResult<Vec<StatusCount>>;
}

#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Record a provider event id; `false` if it was already recorded
    async fn record_event(&self, event_id: &str, event_type: &str, now: i64) -> DbResult<bool>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append_audit(
        &self,
        tenant_id: &str,
        action: &str,
        detail: Option<&serde_json::Value>,
        now: i64,
    ) -> DbResult<()>;
}

/// Every repository handle a service may need, backed by one store
#[derive(Clone)]
pub struct Repositories {
    pub tenants: Arc<dyn TenantRepository>,
    pub compliance: Arc<dyn ComplianceRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub usage: Arc<dyn UsageRepository>,
    pub patients: Arc<dyn PatientRepository>,
    pub segments: Arc<dyn SegmentRepository>,
    pub campaigns: Arc<dyn CampaignRepository>,
    pub reports: Arc<dyn ReportRepository>,
    pub webhook_events: Arc<dyn WebhookEventRepository>,
    pub audit: Arc<dyn AuditRepository>,
}

impl Repositories {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: TenantRepository
            + ComplianceRepository
            + SubscriptionRepository
            + UsageRepository
            + PatientRepository
            + SegmentRepository
            + CampaignRepository
            + ReportRepository
            + WebhookEventRepository
            + AuditRepository
            + 'static,
    {
        Self {
            tenants: store.clone(),
            compliance: store.clone(),
            subscriptions: store.clone(),
            usage: store.clone(),
            patients: store.clone(),
            segments: store.clone(),
            campaigns: store.clone(),
            reports: store.clone(),
            webhook_events: store.clone(),
            audit: store,
        }
    }
}
