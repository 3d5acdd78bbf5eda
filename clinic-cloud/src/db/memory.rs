//! In-memory store
//!
//! Implements every repository trait over plain collections behind a
//! `parking_lot::RwLock`. Same tenant scoping and ordering as `PgStore`;
//! segment filters run through the in-process evaluator.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use shared::models::{
    Appointment, AppointmentStatus, Campaign, CampaignStatus, ComplianceDocument,
    ComplianceDocumentQuery, DocumentStatus, Patient, PatientSummary, Plan, Segment,
    SegmentFilters, SegmentPreview, StaffUser, StatusCount, Subscription, SubscriptionStatus,
    Tenant, TenantStatus,
};

use super::{
    AuditRepository, CampaignRepository, ComplianceRepository, DbResult, PatientRepository,
    ReportRepository, SegmentRepository, SubscriptionRepository, TenantRepository,
    UsageRepository, WebhookEventRepository,
};
use crate::services::segment_filter;

/// Audit entry as kept by the memory store
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub tenant_id: String,
    pub action: String,
    pub detail: Option<serde_json::Value>,
    pub created_at: i64,
}

#[derive(Default)]
struct MemoryData {
    tenants: HashMap<String, Tenant>,
    plans: BTreeMap<String, Plan>,
    subscriptions: HashMap<String, Subscription>,
    users: Vec<StaffUser>,
    patients: Vec<Patient>,
    appointments: Vec<Appointment>,
    documents: BTreeMap<i64, ComplianceDocument>,
    segments: BTreeMap<i64, Segment>,
    campaigns: BTreeMap<i64, Campaign>,
    webhook_events: HashSet<String>,
    audit: Vec<AuditRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
}

/// Plans seeded into every new store
pub fn default_plans() -> Vec<Plan> {
    vec![
        Plan {
            id: "basic".into(),
            name: "Basic".into(),
            max_users: 3,
            max_patients: 500,
            max_appointments_per_month: 300,
            max_storage_gb: 2,
            price_monthly_cents: 4900,
            provider_price_id: None,
        },
        Plan {
            id: "professional".into(),
            name: "Professional".into(),
            max_users: 10,
            max_patients: 5000,
            max_appointments_per_month: 2000,
            max_storage_gb: 20,
            price_monthly_cents: 9900,
            provider_price_id: None,
        },
        Plan {
            id: "enterprise".into(),
            name: "Enterprise".into(),
            max_users: 100,
            max_patients: 100_000,
            max_appointments_per_month: 50_000,
            max_storage_gb: 200,
            price_monthly_cents: 29900,
            provider_price_id: None,
        },
    ]
}

impl MemoryStore {
    pub fn new() -> Self {
        let store = Self::default();
        for plan in default_plans() {
            store.insert_plan(plan);
        }
        store
    }

    pub fn insert_plan(&self, plan: Plan) {
        self.data.write().plans.insert(plan.id.clone(), plan);
    }

    pub fn insert_user(&self, user: StaffUser) {
        self.data.write().users.push(user);
    }

    pub fn insert_patient(&self, patient: Patient) {
        self.data.write().patients.push(patient);
    }

    pub fn insert_appointment(&self, appointment: Appointment) {
        self.data.write().appointments.push(appointment);
    }

    /// Audit entries for one tenant, oldest first
    pub fn audit_entries(&self, tenant_id: &str) -> Vec<AuditRecord> {
        self.data
            .read()
            .audit
            .iter()
            .filter(|a| a.tenant_id == tenant_id)
            .cloned()
            .collect()
    }
}

fn count_by<I>(statuses: I) -> Vec<StatusCount>
where
    I: IntoIterator<Item = &'static str>,
{
    let mut counts: BTreeMap<&'static str, i64> = BTreeMap::new();
    for s in statuses {
        *counts.entry(s).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(status, count)| StatusCount {
            status: status.to_string(),
            count,
        })
        .collect()
}

fn document_order(a: &ComplianceDocument, b: &ComplianceDocument) -> std::cmp::Ordering {
    // expiration_date ASC NULLS LAST, id ASC
    match (a.expiration_date, b.expiration_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
    .then(a.id.cmp(&b.id))
}

#[async_trait]
impl TenantRepository for MemoryStore {
    async fn create_tenant(&self, tenant: &Tenant) -> DbResult<()> {
        let mut data = self.data.write();
        if data.tenants.contains_key(&tenant.id) {
            return Err(format!("tenant {} already exists", tenant.id).into());
        }
        data.tenants.insert(tenant.id.clone(), tenant.clone());
        Ok(())
    }

    async fn find_tenant(&self, tenant_id: &str) -> DbResult<Option<Tenant>> {
        Ok(self.data.read().tenants.get(tenant_id).cloned())
    }

    async fn find_tenant_by_billing_customer(
        &self,
        customer_id: &str,
    ) -> DbResult<Option<Tenant>> {
        Ok(self
            .data
            .read()
            .tenants
            .values()
            .find(|t| t.billing_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn set_billing_customer(&self, tenant_id: &str, customer_id: &str) -> DbResult<()> {
        if let Some(t) = self.data.write().tenants.get_mut(tenant_id) {
            t.billing_customer_id = Some(customer_id.to_string());
        }
        Ok(())
    }

    async fn update_tenant_status(&self, tenant_id: &str, status: TenantStatus) -> DbResult<()> {
        if let Some(t) = self.data.write().tenants.get_mut(tenant_id) {
            t.status = status;
        }
        Ok(())
    }

    async fn list_tenant_ids(&self) -> DbResult<Vec<String>> {
        let mut ids: Vec<String> = self.data.read().tenants.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl ComplianceRepository for MemoryStore {
    async fn insert_document(&self, doc: &ComplianceDocument) -> DbResult<()> {
        self.data.write().documents.insert(doc.id, doc.clone());
        Ok(())
    }

    async fn find_document(
        &self,
        tenant_id: &str,
        id: i64,
    ) -> DbResult<Option<ComplianceDocument>> {
        Ok(self
            .data
            .read()
            .documents
            .get(&id)
            .filter(|d| d.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_documents(
        &self,
        tenant_id: &str,
        query: &ComplianceDocumentQuery,
    ) -> DbResult<Vec<ComplianceDocument>> {
        let data = self.data.read();
        let mut docs: Vec<ComplianceDocument> = data
            .documents
            .values()
            .filter(|d| d.tenant_id == tenant_id)
            .filter(|d| query.status.is_none_or(|s| d.status == s))
            .filter(|d| query.staff_id.is_none_or(|s| d.staff_id == Some(s)))
            .cloned()
            .collect();
        docs.sort_by(document_order);
        Ok(docs)
    }

    async fn replace_document(&self, doc: &ComplianceDocument) -> DbResult<bool> {
        let mut data = self.data.write();
        match data.documents.get_mut(&doc.id) {
            Some(existing) if existing.tenant_id == doc.tenant_id => {
                *existing = doc.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_document(&self, tenant_id: &str, id: i64) -> DbResult<bool> {
        let mut data = self.data.write();
        let owned = data
            .documents
            .get(&id)
            .is_some_and(|d| d.tenant_id == tenant_id);
        if owned {
            data.documents.remove(&id);
        }
        Ok(owned)
    }

    async fn list_recompute_candidates(
        &self,
        tenant_id: &str,
    ) -> DbResult<Vec<ComplianceDocument>> {
        Ok(self
            .data
            .read()
            .documents
            .values()
            .filter(|d| d.tenant_id == tenant_id && d.status != DocumentStatus::PendingRenewal)
            .cloned()
            .collect())
    }

    async fn set_document_status(
        &self,
        tenant_id: &str,
        id: i64,
        status: DocumentStatus,
        now: i64,
    ) -> DbResult<bool> {
        let mut data = self.data.write();
        match data.documents.get_mut(&id) {
            Some(d) if d.tenant_id == tenant_id => {
                d.status = status;
                d.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_documents_by_status(&self, tenant_id: &str) -> DbResult<Vec<StatusCount>> {
        let data = self.data.read();
        Ok(count_by(
            data.documents
                .values()
                .filter(|d| d.tenant_id == tenant_id)
                .map(|d| d.status.as_db()),
        ))
    }

    async fn total_file_bytes(&self, tenant_id: &str) -> DbResult<i64> {
        Ok(self
            .data
            .read()
            .documents
            .values()
            .filter(|d| d.tenant_id == tenant_id)
            .filter_map(|d| d.file_size)
            .sum())
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn find_subscription(&self, tenant_id: &str) -> DbResult<Option<Subscription>> {
        Ok(self.data.read().subscriptions.get(tenant_id).cloned())
    }

    async fn upsert_subscription(&self, sub: &Subscription) -> DbResult<()> {
        self.data
            .write()
            .subscriptions
            .insert(sub.tenant_id.clone(), sub.clone());
        Ok(())
    }

    async fn update_subscription_status(
        &self,
        tenant_id: &str,
        status: SubscriptionStatus,
        now: i64,
    ) -> DbResult<bool> {
        match self.data.write().subscriptions.get_mut(tenant_id) {
            Some(sub) => {
                sub.status = status;
                sub.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_tenant_by_provider_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> DbResult<Option<String>> {
        Ok(self
            .data
            .read()
            .subscriptions
            .values()
            .find(|s| s.provider_subscription_id.as_deref() == Some(provider_subscription_id))
            .map(|s| s.tenant_id.clone()))
    }

    async fn find_plan(&self, plan_id: &str) -> DbResult<Option<Plan>> {
        Ok(self.data.read().plans.get(plan_id).cloned())
    }

    async fn list_plans(&self) -> DbResult<Vec<Plan>> {
        let mut plans: Vec<Plan> = self.data.read().plans.values().cloned().collect();
        plans.sort_by_key(|p| p.price_monthly_cents);
        Ok(plans)
    }
}

#[async_trait]
impl UsageRepository for MemoryStore {
    async fn count_active_users(&self, tenant_id: &str) -> DbResult<i64> {
        Ok(self
            .data
            .read()
            .users
            .iter()
            .filter(|u| u.tenant_id == tenant_id && u.is_active)
            .count() as i64)
    }

    async fn staff_exists(&self, tenant_id: &str, staff_id: i64) -> DbResult<bool> {
        Ok(self
            .data
            .read()
            .users
            .iter()
            .any(|u| u.tenant_id == tenant_id && u.id == staff_id))
    }

    async fn count_appointments_created_between(
        &self,
        tenant_id: &str,
        from: i64,
        to: i64,
    ) -> DbResult<i64> {
        Ok(self
            .data
            .read()
            .appointments
            .iter()
            .filter(|a| a.tenant_id == tenant_id && a.created_at >= from && a.created_at < to)
            .count() as i64)
    }
}

#[async_trait]
impl PatientRepository for MemoryStore {
    async fn count_active_patients(&self, tenant_id: &str) -> DbResult<i64> {
        Ok(self
            .data
            .read()
            .patients
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.is_active)
            .count() as i64)
    }

    async fn query_audience(
        &self,
        tenant_id: &str,
        filters: &SegmentFilters,
        now: i64,
        limit: i64,
    ) -> DbResult<SegmentPreview> {
        let data = self.data.read();
        let mut matched: Vec<&Patient> = data
            .patients
            .iter()
            .filter(|p| p.tenant_id == tenant_id)
            .filter(|p| {
                let visits: Vec<i64> = data
                    .appointments
                    .iter()
                    .filter(|a| {
                        a.tenant_id == tenant_id
                            && a.patient_id == p.id
                            && a.status == AppointmentStatus::Completed
                    })
                    .map(|a| a.start_at)
                    .collect();
                segment_filter::matches(filters, p, &visits, now)
            })
            .collect();
        matched.sort_by(|a, b| {
            a.last_name
                .cmp(&b.last_name)
                .then_with(|| a.first_name.cmp(&b.first_name))
                .then(a.id.cmp(&b.id))
        });

        let sample = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(SegmentPreview {
            count: matched.len() as i64,
            patients: matched
                .into_iter()
                .take(sample)
                .map(PatientSummary::from)
                .collect(),
        })
    }
}

#[async_trait]
impl SegmentRepository for MemoryStore {
    async fn insert_segment(&self, segment: &Segment) -> DbResult<()> {
        self.data.write().segments.insert(segment.id, segment.clone());
        Ok(())
    }

    async fn find_segment(&self, tenant_id: &str, id: i64) -> DbResult<Option<Segment>> {
        Ok(self
            .data
            .read()
            .segments
            .get(&id)
            .filter(|s| s.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_segments(&self, tenant_id: &str) -> DbResult<Vec<Segment>> {
        let mut segments: Vec<Segment> = self
            .data
            .read()
            .segments
            .values()
            .filter(|s| s.tenant_id == tenant_id)
            .cloned()
            .collect();
        segments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(segments)
    }

    async fn replace_segment(&self, segment: &Segment) -> DbResult<bool> {
        match self.data.write().segments.get_mut(&segment.id) {
            Some(existing) if existing.tenant_id == segment.tenant_id => {
                *existing = segment.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_segment(&self, tenant_id: &str, id: i64) -> DbResult<bool> {
        let mut data = self.data.write();
        let owned = data
            .segments
            .get(&id)
            .is_some_and(|s| s.tenant_id == tenant_id);
        if owned {
            data.segments.remove(&id);
        }
        Ok(owned)
    }
}

#[async_trait]
impl CampaignRepository for MemoryStore {
    async fn insert_campaign(&self, campaign: &Campaign) -> DbResult<()> {
        self.data
            .write()
            .campaigns
            .insert(campaign.id, campaign.clone());
        Ok(())
    }

    async fn find_campaign(&self, tenant_id: &str, id: i64) -> DbResult<Option<Campaign>> {
        Ok(self
            .data
            .read()
            .campaigns
            .get(&id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_campaigns(
        &self,
        tenant_id: &str,
        status: Option<CampaignStatus>,
    ) -> DbResult<Vec<Campaign>> {
        let mut campaigns: Vec<Campaign> = self
            .data
            .read()
            .campaigns
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .filter(|c| status.is_none_or(|s| c.status == s))
            .cloned()
            .collect();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(campaigns)
    }

    async fn replace_campaign(&self, campaign: &Campaign) -> DbResult<bool> {
        match self.data.write().campaigns.get_mut(&campaign.id) {
            Some(existing) if existing.tenant_id == campaign.tenant_id => {
                *existing = campaign.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_campaign(&self, tenant_id: &str, id: i64) -> DbResult<bool> {
        let mut data = self.data.write();
        let owned = data
            .campaigns
            .get(&id)
            .is_some_and(|c| c.tenant_id == tenant_id);
        if owned {
            data.campaigns.remove(&id);
        }
        Ok(owned)
    }

    async fn count_open_campaigns_for_segment(
        &self,
        tenant_id: &str,
        segment_id: i64,
    ) -> DbResult<i64> {
        Ok(self
            .data
            .read()
            .campaigns
            .values()
            .filter(|c| {
                c.tenant_id == tenant_id && c.segment_id == segment_id && !c.status.is_terminal()
            })
            .count() as i64)
    }
}

#[async_trait]
impl ReportRepository for MemoryStore {
    async fn appointment_counts_by_status(
        &self,
        tenant_id: &str,
        from: i64,
        to: i64,
    ) -> DbResult<Vec<StatusCount>> {
        let data = self.data.read();
        Ok(count_by(
            data.appointments
                .iter()
                .filter(|a| a.tenant_id == tenant_id && a.start_at >= from && a.start_at < to)
                .map(|a| a.status.as_db()),
        ))
    }

    async fn count_new_patients(&self, tenant_id: &str, from: i64, to: i64) -> DbResult<i64> {
        Ok(self
            .data
            .read()
            .patients
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.created_at >= from && p.created_at < to)
            .count() as i64)
    }

    async fn campaign_counts_by_status(&self, tenant_id: &str) -> DbResult<Vec<StatusCount>> {
        let data = self.data.read();
        Ok(count_by(
            data.campaigns
                .values()
                .filter(|c| c.tenant_id == tenant_id)
                .map(|c| c.status.as_db()),
        ))
    }
}

#[async_trait]
impl WebhookEventRepository for MemoryStore {
    async fn record_event(&self, event_id: &str, _event_type: &str, _now: i64) -> DbResult<bool> {
        Ok(self
            .data
            .write()
            .webhook_events
            .insert(event_id.to_string()))
    }
}

#[async_trait]
impl AuditRepository for MemoryStore {
    async fn append_audit(
        &self,
        tenant_id: &str,
        action: &str,
        detail: Option<&serde_json::Value>,
        now: i64,
    ) -> DbResult<()> {
        self.data.write().audit.push(AuditRecord {
            tenant_id: tenant_id.to_string(),
            action: action.to_string(),
            detail: detail.cloned(),
            created_at: now,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: i64, tenant: &str, status: DocumentStatus) -> ComplianceDocument {
        ComplianceDocument {
            id,
            tenant_id: tenant.into(),
            staff_id: None,
            name: format!("doc-{id}"),
            document_type: "LICENSE".into(),
            issue_date: 0,
            expiration_date: None,
            status,
            renewal_started_at: None,
            file_url: None,
            file_size: Some(1024),
            mime_type: None,
            notes: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn test_documents_are_tenant_scoped() {
        let store = MemoryStore::new();
        store.insert_document(&doc(1, "a", DocumentStatus::Valid)).await.unwrap();
        store.insert_document(&doc(2, "b", DocumentStatus::Valid)).await.unwrap();

        assert!(store.find_document("a", 2).await.unwrap().is_none());
        assert!(!store.delete_document("a", 2).await.unwrap());
        assert!(
            !store
                .set_document_status("a", 2, DocumentStatus::Expired, 5)
                .await
                .unwrap()
        );
        let mut foreign = doc(2, "a", DocumentStatus::Expired);
        foreign.name = "hijack".into();
        assert!(!store.replace_document(&foreign).await.unwrap());
        assert_eq!(store.total_file_bytes("a").await.unwrap(), 1024);
        assert_eq!(
            store.find_document("b", 2).await.unwrap().unwrap().name,
            "doc-2"
        );
    }

    #[tokio::test]
    async fn test_recompute_candidates_skip_pending_renewal() {
        let store = MemoryStore::new();
        store.insert_document(&doc(1, "a", DocumentStatus::Valid)).await.unwrap();
        store
            .insert_document(&doc(2, "a", DocumentStatus::PendingRenewal))
            .await
            .unwrap();
        let ids: Vec<i64> = store
            .list_recompute_candidates("a")
            .await
            .unwrap()
            .iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn test_count_documents_by_status() {
        let store = MemoryStore::new();
        store.insert_document(&doc(1, "a", DocumentStatus::Valid)).await.unwrap();
        store.insert_document(&doc(2, "a", DocumentStatus::Valid)).await.unwrap();
        store.insert_document(&doc(3, "a", DocumentStatus::Expired)).await.unwrap();
        let counts = store.count_documents_by_status("a").await.unwrap();
        assert_eq!(
            counts,
            vec![
                StatusCount {
                    status: "EXPIRED".into(),
                    count: 1
                },
                StatusCount {
                    status: "VALID".into(),
                    count: 2
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_record_event_once() {
        let store = MemoryStore::new();
        assert!(store.record_event("evt_1", "invoice.paid", 0).await.unwrap());
        assert!(!store.record_event("evt_1", "invoice.paid", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_default_plans_seeded() {
        let store = MemoryStore::new();
        let ids: Vec<String> = store
            .list_plans()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["basic", "professional", "enterprise"]);
    }
}
