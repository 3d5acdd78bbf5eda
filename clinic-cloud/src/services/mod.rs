//! Business services
//!
//! Each service owns the repository handles it needs plus the shared clock.
//! Nothing here reads the system time or holds global state.

pub mod campaign;
pub mod compliance;
pub mod report;
pub mod segment;
pub mod segment_filter;
pub mod subscription;

pub use campaign::CampaignService;
pub use compliance::ComplianceService;
pub use report::ReportService;
pub use segment::SegmentService;
pub use subscription::{SubscriptionService, SubscriptionSettings};

use std::sync::Arc;

use crate::billing::{BillingProvider, WebhookProcessor};
use crate::clock::Clock;
use crate::config::Config;
use crate::db::{AuditRepository, Repositories};

/// Append an audit entry. Failures are logged and never fail the caller.
pub(crate) async fn audit(
    repo: &dyn AuditRepository,
    tenant_id: &str,
    action: &str,
    detail: Option<serde_json::Value>,
    now: i64,
) {
    if let Err(e) = repo.append_audit(tenant_id, action, detail.as_ref(), now).await {
        tracing::warn!(tenant_id = %tenant_id, action, error = %e, "Failed to write audit log");
    }
}

/// All services wired against one store, billing provider and clock
#[derive(Clone)]
pub struct Services {
    pub compliance: ComplianceService,
    pub subscriptions: SubscriptionService,
    pub segments: SegmentService,
    pub campaigns: CampaignService,
    pub reports: ReportService,
    pub webhooks: WebhookProcessor,
}

impl Services {
    pub fn new(
        repos: &Repositories,
        billing: Arc<dyn BillingProvider>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        let settings = SubscriptionSettings {
            trial_days: config.trial_days,
            checkout_success_url: config.billing_success_url.clone(),
            checkout_cancel_url: config.billing_cancel_url.clone(),
            portal_return_url: config.billing_portal_return_url.clone(),
        };
        Self {
            compliance: ComplianceService::new(repos, clock.clone()),
            subscriptions: SubscriptionService::new(repos, billing, clock.clone(), settings),
            segments: SegmentService::new(repos, clock.clone(), config.segment_preview_limit),
            campaigns: CampaignService::new(repos, clock.clone()),
            reports: ReportService::new(repos, clock.clone()),
            webhooks: WebhookProcessor::new(repos, clock, config.stripe_webhook_secret.clone()),
        }
    }
}
