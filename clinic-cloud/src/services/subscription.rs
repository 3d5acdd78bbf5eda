//! Subscription & usage service
//!
//! Trial expiry is lazy: reading a TRIALING subscription whose trial has
//! ended persists EXPIRED before answering. The write always targets the
//! same status, so concurrent readers racing on it are harmless.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Months, NaiveDate};
use shared::error::{AppError, ErrorCode};
use shared::models::{
    Plan, Subscription, SubscriptionStatus, Tenant, TenantStatus, UsageCheck, UsageMetric,
    UsageSummary,
};
use shared::util::{DAY_MS, snowflake_id};

use super::audit;
use crate::billing::{BillingProvider, CheckoutRequest};
use crate::clock::Clock;
use crate::db::{
    AuditRepository, ComplianceRepository, PatientRepository, Repositories,
    SubscriptionRepository, TenantRepository, UsageRepository,
};
use crate::error::ServiceResult;

/// Tunables taken from `Config`
#[derive(Debug, Clone)]
pub struct SubscriptionSettings {
    pub trial_days: i64,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    pub portal_return_url: String,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            trial_days: 14,
            checkout_success_url: "http://localhost:5173/billing/success".into(),
            checkout_cancel_url: "http://localhost:5173/billing/cancel".into(),
            portal_return_url: "http://localhost:5173/settings/billing".into(),
        }
    }
}

/// `[start, end)` of the UTC calendar month containing `now`, in millis
pub fn calendar_month_bounds(now: i64) -> Option<(i64, i64)> {
    let date = DateTime::from_timestamp_millis(now)?.date_naive();
    let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?;
    let next = first.checked_add_months(Months::new(1))?;
    Some((
        first.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis(),
        next.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis(),
    ))
}

/// Whole days left in a trial, rounded up and never negative
pub fn trial_days_remaining(trial_ends_at: i64, now: i64) -> i64 {
    let diff = trial_ends_at.saturating_sub(now);
    if diff <= 0 {
        return 0;
    }
    diff / DAY_MS + i64::from(diff % DAY_MS != 0)
}

/// `base` plus `days` whole days; rejects non-positive or out-of-range lengths
pub fn add_trial_days(base: i64, days: i64) -> Result<i64, AppError> {
    if days <= 0 {
        return Err(AppError::validation("Trial length must be at least one day")
            .with_detail("days", days));
    }
    days.checked_mul(DAY_MS)
        .and_then(|ms| base.checked_add(ms))
        .ok_or_else(|| {
            AppError::validation("Trial length out of range").with_detail("days", days)
        })
}

fn no_subscription() -> AppError {
    AppError::new(ErrorCode::TenantNoSubscription)
}

#[derive(Clone)]
pub struct SubscriptionService {
    tenants: Arc<dyn TenantRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    usage: Arc<dyn UsageRepository>,
    patients: Arc<dyn PatientRepository>,
    documents: Arc<dyn ComplianceRepository>,
    audit: Arc<dyn AuditRepository>,
    billing: Arc<dyn BillingProvider>,
    clock: Arc<dyn Clock>,
    settings: SubscriptionSettings,
}

impl SubscriptionService {
    pub fn new(
        repos: &Repositories,
        billing: Arc<dyn BillingProvider>,
        clock: Arc<dyn Clock>,
        settings: SubscriptionSettings,
    ) -> Self {
        Self {
            tenants: repos.tenants.clone(),
            subscriptions: repos.subscriptions.clone(),
            usage: repos.usage.clone(),
            patients: repos.patients.clone(),
            documents: repos.compliance.clone(),
            audit: repos.audit.clone(),
            billing,
            clock,
            settings,
        }
    }

    /// Create a clinic account and start its trial on `plan_id`
    pub async fn register_tenant(
        &self,
        name: &str,
        email: &str,
        plan_id: &str,
    ) -> ServiceResult<(Tenant, Subscription)> {
        if name.trim().is_empty() || email.trim().is_empty() {
            return Err(AppError::validation("Clinic name and email are required").into());
        }
        self.require_plan(plan_id).await?;

        let tenant = Tenant {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            email: email.trim().to_lowercase(),
            status: TenantStatus::Active,
            billing_customer_id: None,
            created_at: self.clock.now_millis(),
        };
        self.tenants.create_tenant(&tenant).await?;
        tracing::info!(tenant_id = %tenant.id, "Tenant registered");

        let sub = self.start_trial(&tenant.id, plan_id).await?;
        Ok((tenant, sub))
    }

    /// New TRIALING subscription ending `trial_days` from now
    pub async fn start_trial(&self, tenant_id: &str, plan_id: &str) -> ServiceResult<Subscription> {
        if self.tenants.find_tenant(tenant_id).await?.is_none() {
            return Err(AppError::new(ErrorCode::TenantNotFound).into());
        }
        self.require_plan(plan_id).await?;
        if self.subscriptions.find_subscription(tenant_id).await?.is_some() {
            return Err(AppError::already_exists("Subscription").into());
        }

        let now = self.clock.now_millis();
        let trial_ends_at = add_trial_days(now, self.settings.trial_days)?;
        let sub = Subscription {
            id: snowflake_id(),
            tenant_id: tenant_id.to_string(),
            plan_id: plan_id.to_string(),
            status: SubscriptionStatus::Trialing,
            trial_ends_at: Some(trial_ends_at),
            current_period_end: None,
            provider_customer_id: None,
            provider_subscription_id: None,
            created_at: now,
            updated_at: now,
        };
        self.subscriptions.upsert_subscription(&sub).await?;

        let detail = serde_json::json!({ "plan": plan_id, "trial_ends_at": sub.trial_ends_at });
        audit(&*self.audit, tenant_id, "trial_started", Some(detail), now).await;
        Ok(sub)
    }

    /// Subscription with lazy trial expiry applied
    pub async fn get_subscription(&self, tenant_id: &str) -> ServiceResult<Option<Subscription>> {
        self.subscription_at(tenant_id, self.clock.now_millis()).await
    }

    async fn subscription_at(
        &self,
        tenant_id: &str,
        now: i64,
    ) -> ServiceResult<Option<Subscription>> {
        let Some(mut sub) = self.subscriptions.find_subscription(tenant_id).await? else {
            return Ok(None);
        };
        if sub.status == SubscriptionStatus::Trialing
            && sub.trial_ends_at.is_some_and(|end| end <= now)
        {
            self.subscriptions
                .update_subscription_status(tenant_id, SubscriptionStatus::Expired, now)
                .await?;
            tracing::info!(tenant_id = %tenant_id, trial_ends_at = ?sub.trial_ends_at, "Trial expired");
            sub.status = SubscriptionStatus::Expired;
            sub.updated_at = now;
        }
        Ok(Some(sub))
    }

    /// ACTIVE, or TRIALING with the trial not yet over
    pub async fn is_subscription_active(&self, tenant_id: &str) -> ServiceResult<bool> {
        let now = self.clock.now_millis();
        let Some(sub) = self.subscription_at(tenant_id, now).await? else {
            return Ok(false);
        };
        Ok(match sub.status {
            SubscriptionStatus::Active => true,
            SubscriptionStatus::Trialing => sub.trial_ends_at.is_none_or(|end| end > now),
            _ => false,
        })
    }

    /// Live count for `metric` against the plan ceiling; `allowed` is
    /// `current < limit`.
    pub async fn check_usage_limit(
        &self,
        tenant_id: &str,
        metric: UsageMetric,
    ) -> ServiceResult<UsageCheck> {
        let sub = self
            .subscriptions
            .find_subscription(tenant_id)
            .await?
            .ok_or_else(no_subscription)?;
        let plan = self.require_plan(&sub.plan_id).await?;
        self.usage_for(tenant_id, &plan, metric).await
    }

    /// Guard for operations that need a paying or trialing tenant
    pub async fn require_active(&self, tenant_id: &str) -> ServiceResult<()> {
        if !self.is_subscription_active(tenant_id).await? {
            return Err(AppError::new(ErrorCode::SubscriptionInactive)
                .with_detail("tenant_id", tenant_id)
                .into());
        }
        Ok(())
    }

    /// Guard before adding one more unit of `metric`
    pub async fn require_usage(
        &self,
        tenant_id: &str,
        metric: UsageMetric,
    ) -> ServiceResult<UsageCheck> {
        let check = self.check_usage_limit(tenant_id, metric).await?;
        if !check.allowed {
            tracing::info!(
                tenant_id = %tenant_id,
                metric = metric.as_str(),
                current = check.current,
                limit = check.limit,
                "Usage limit reached"
            );
            return Err(AppError::with_message(
                ErrorCode::UsageLimitReached,
                format!("Plan limit reached for {}", metric.as_str()),
            )
            .with_detail("metric", metric.as_str())
            .with_detail("current", check.current)
            .with_detail("limit", check.limit)
            .into());
        }
        Ok(check)
    }

    pub async fn usage_summary(&self, tenant_id: &str) -> ServiceResult<UsageSummary> {
        let sub = self
            .subscriptions
            .find_subscription(tenant_id)
            .await?
            .ok_or_else(no_subscription)?;
        let plan = self.require_plan(&sub.plan_id).await?;

        let mut metrics = Vec::with_capacity(UsageMetric::ALL.len());
        for metric in UsageMetric::ALL {
            metrics.push(self.usage_for(tenant_id, &plan, metric).await?);
        }
        Ok(UsageSummary {
            plan_id: plan.id,
            metrics,
        })
    }

    async fn usage_for(
        &self,
        tenant_id: &str,
        plan: &Plan,
        metric: UsageMetric,
    ) -> ServiceResult<UsageCheck> {
        let current = match metric {
            UsageMetric::Users => self.usage.count_active_users(tenant_id).await?,
            UsageMetric::Patients => self.patients.count_active_patients(tenant_id).await?,
            UsageMetric::Appointments => {
                let (from, to) = calendar_month_bounds(self.clock.now_millis())
                    .ok_or_else(|| AppError::internal("Clock out of range"))?;
                self.usage
                    .count_appointments_created_between(tenant_id, from, to)
                    .await?
            }
            UsageMetric::Storage => self.documents.total_file_bytes(tenant_id).await? / 1024 / 1024,
        };
        let limit = plan.limit_for(metric);
        Ok(UsageCheck {
            metric,
            allowed: current < limit,
            current,
            limit,
        })
    }

    /// Days left in a trial, `None` unless the tenant is TRIALING with an end date
    pub async fn get_trial_days_remaining(&self, tenant_id: &str) -> ServiceResult<Option<i64>> {
        let Some(sub) = self.subscriptions.find_subscription(tenant_id).await? else {
            return Ok(None);
        };
        if sub.status != SubscriptionStatus::Trialing {
            return Ok(None);
        }
        Ok(sub
            .trial_ends_at
            .map(|end| trial_days_remaining(end, self.clock.now_millis())))
    }

    /// Push the trial end `days` forward from the later of now and the
    /// current end; the subscription becomes TRIALING.
    pub async fn extend_trial(&self, tenant_id: &str, days: i64) -> ServiceResult<Subscription> {
        let mut sub = self
            .subscriptions
            .find_subscription(tenant_id)
            .await?
            .ok_or_else(|| {
                AppError::with_message(
                    ErrorCode::TenantNoSubscription,
                    format!("Cannot extend trial: tenant {tenant_id} has no subscription"),
                )
            })?;

        let now = self.clock.now_millis();
        let base = sub.trial_ends_at.map_or(now, |end| end.max(now));
        sub.trial_ends_at = Some(add_trial_days(base, days)?);
        sub.status = SubscriptionStatus::Trialing;
        sub.updated_at = now;
        self.subscriptions.upsert_subscription(&sub).await?;

        tracing::info!(tenant_id = %tenant_id, days, "Trial extended");
        let detail = serde_json::json!({ "days": days, "trial_ends_at": sub.trial_ends_at });
        audit(&*self.audit, tenant_id, "trial_extended", Some(detail), now).await;
        Ok(sub)
    }

    pub async fn change_plan(&self, tenant_id: &str, plan_id: &str) -> ServiceResult<Subscription> {
        let plan = self.require_plan(plan_id).await?;
        let mut sub = self
            .subscriptions
            .find_subscription(tenant_id)
            .await?
            .ok_or_else(no_subscription)?;

        let now = self.clock.now_millis();
        let previous = std::mem::replace(&mut sub.plan_id, plan.id);
        sub.updated_at = now;
        self.subscriptions.upsert_subscription(&sub).await?;

        let detail = serde_json::json!({ "from": previous, "to": sub.plan_id });
        audit(&*self.audit, tenant_id, "plan_changed", Some(detail), now).await;
        Ok(sub)
    }

    pub async fn cancel(&self, tenant_id: &str) -> ServiceResult<Subscription> {
        let mut sub = self
            .subscriptions
            .find_subscription(tenant_id)
            .await?
            .ok_or_else(no_subscription)?;

        let now = self.clock.now_millis();
        self.subscriptions
            .update_subscription_status(tenant_id, SubscriptionStatus::Cancelled, now)
            .await?;
        sub.status = SubscriptionStatus::Cancelled;
        sub.updated_at = now;

        tracing::info!(tenant_id = %tenant_id, "Subscription cancelled");
        audit(&*self.audit, tenant_id, "subscription_cancelled", None, now).await;
        Ok(sub)
    }

    pub async fn list_plans(&self) -> ServiceResult<Vec<Plan>> {
        Ok(self.subscriptions.list_plans().await?)
    }

    /// Hosted checkout URL for `plan_id`, creating the provider customer on first use
    pub async fn start_checkout(&self, tenant_id: &str, plan_id: &str) -> ServiceResult<String> {
        let tenant = self
            .tenants
            .find_tenant(tenant_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::TenantNotFound))?;
        let plan = self.require_plan(plan_id).await?;
        let price_id = plan.provider_price_id.as_deref().ok_or_else(|| {
            AppError::with_message(
                ErrorCode::PaymentSetupFailed,
                format!("Plan {plan_id} is not available for online checkout"),
            )
        })?;

        let customer_id = match tenant.billing_customer_id {
            Some(id) => id,
            None => {
                let id = self.billing.create_customer(&tenant.email, &tenant.id).await?;
                self.tenants.set_billing_customer(&tenant.id, &id).await?;
                tracing::info!(tenant_id = %tenant.id, "Billing customer created");
                id
            }
        };

        let url = self
            .billing
            .create_checkout_session(&CheckoutRequest {
                customer_id: &customer_id,
                tenant_id: &tenant.id,
                price_id,
                plan_id: &plan.id,
                success_url: &self.settings.checkout_success_url,
                cancel_url: &self.settings.checkout_cancel_url,
            })
            .await?;
        Ok(url)
    }

    /// Billing portal URL; the tenant must already be a provider customer
    pub async fn billing_portal(&self, tenant_id: &str) -> ServiceResult<String> {
        let tenant = self
            .tenants
            .find_tenant(tenant_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::TenantNotFound))?;
        let customer_id = tenant.billing_customer_id.ok_or_else(|| {
            AppError::with_message(ErrorCode::PaymentSetupFailed, "No billing account on file")
        })?;
        let url = self
            .billing
            .create_portal_session(&customer_id, &self.settings.portal_return_url)
            .await?;
        Ok(url)
    }

    async fn require_plan(&self, plan_id: &str) -> ServiceResult<Plan> {
        Ok(self
            .subscriptions
            .find_plan(plan_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::PlanNotFound).with_detail("plan_id", plan_id))?)
    }
}
