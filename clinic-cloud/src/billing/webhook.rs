//! Billing webhook reconciliation
//!
//! Local subscription state follows the provider only through these events;
//! nothing polls the provider.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use shared::error::{AppError, ErrorCode};
use shared::models::{Subscription, SubscriptionStatus, TenantStatus};
use shared::util::snowflake_id;

use super::stripe::verify_webhook_signature;
use crate::clock::Clock;
use crate::db::{
    AuditRepository, Repositories, SubscriptionRepository, TenantRepository,
    WebhookEventRepository,
};
use crate::error::ServiceResult;
use crate::services::audit;

/// Plan assigned when a checkout carries no usable plan and none is on file
const FALLBACK_PLAN: &str = "basic";

/// What happened to a delivered event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// Local state updated
    Processed,
    /// Event id seen before; nothing done
    Duplicate,
    /// Valid event with nothing to apply (unknown type, unknown tenant, ...)
    Ignored,
}

/// Map a provider subscription status onto ours
pub fn map_provider_status(status: &str) -> Option<SubscriptionStatus> {
    match status {
        "trialing" => Some(SubscriptionStatus::Trialing),
        "active" => Some(SubscriptionStatus::Active),
        "past_due" | "unpaid" => Some(SubscriptionStatus::PastDue),
        "canceled" => Some(SubscriptionStatus::Cancelled),
        "incomplete_expired" => Some(SubscriptionStatus::Expired),
        _ => None,
    }
}

fn seconds_to_millis(v: &Value) -> Option<i64> {
    v.as_i64().map(|s| s.saturating_mul(1000))
}

#[derive(Clone)]
pub struct WebhookProcessor {
    tenants: Arc<dyn TenantRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    events: Arc<dyn WebhookEventRepository>,
    audit: Arc<dyn AuditRepository>,
    clock: Arc<dyn Clock>,
    signing_secret: String,
}

impl WebhookProcessor {
    pub fn new(repos: &Repositories, clock: Arc<dyn Clock>, signing_secret: impl Into<String>) -> Self {
        Self {
            tenants: repos.tenants.clone(),
            subscriptions: repos.subscriptions.clone(),
            events: repos.webhook_events.clone(),
            audit: repos.audit.clone(),
            clock,
            signing_secret: signing_secret.into(),
        }
    }

    /// Verify, de-duplicate and apply one raw webhook delivery.
    ///
    /// The event id is recorded before the event is applied.
    pub async fn process(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> ServiceResult<WebhookOutcome> {
        let now = self.clock.now_millis();

        let signature = signature.ok_or_else(|| {
            AppError::with_message(
                ErrorCode::WebhookSignatureInvalid,
                "Missing Stripe-Signature header",
            )
        })?;
        verify_webhook_signature(payload, signature, &self.signing_secret, now / 1000).map_err(
            |e| {
                tracing::warn!(error = e, "Webhook signature verification failed");
                AppError::with_message(ErrorCode::WebhookSignatureInvalid, e)
            },
        )?;

        let event: Value = serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!(%e, "Failed to parse webhook JSON");
            AppError::with_message(ErrorCode::WebhookPayloadInvalid, e.to_string())
        })?;

        let event_type = event["type"].as_str().unwrap_or("");
        let event_id = event["id"].as_str().ok_or_else(|| {
            AppError::with_message(ErrorCode::WebhookPayloadInvalid, "Webhook event missing id")
        })?;
        tracing::info!(event_id = event_id, event_type = event_type, "Received billing webhook");

        if !self.events.record_event(event_id, event_type, now).await? {
            tracing::info!(event_id = event_id, "Duplicate webhook event, skipping");
            return Ok(WebhookOutcome::Duplicate);
        }

        let obj = &event["data"]["object"];
        let outcome = match event_type {
            "checkout.session.completed" => self.checkout_completed(obj, now).await?,
            "customer.subscription.updated" => self.subscription_updated(obj, now).await?,
            "customer.subscription.deleted" => self.subscription_deleted(obj, now).await?,
            "invoice.paid" => self.invoice_paid(obj, now).await?,
            "invoice.payment_failed" => self.invoice_payment_failed(obj, now).await?,
            _ => {
                tracing::debug!(event_type = event_type, "Unhandled webhook event type");
                WebhookOutcome::Ignored
            }
        };

        tracing::info!(event_id = event_id, event_type = event_type, outcome = ?outcome, "Webhook handled");
        Ok(outcome)
    }

    /// Tenant for a subscription/invoice object: provider subscription id,
    /// then `metadata.tenant_id`, then the billing customer.
    async fn resolve_tenant(
        &self,
        provider_subscription_id: Option<&str>,
        obj: &Value,
    ) -> ServiceResult<Option<String>> {
        if let Some(sub_id) = provider_subscription_id {
            if let Some(tenant_id) = self
                .subscriptions
                .find_tenant_by_provider_subscription(sub_id)
                .await?
            {
                return Ok(Some(tenant_id));
            }
        }
        if let Some(tenant_id) = obj["metadata"]["tenant_id"].as_str() {
            if self.tenants.find_tenant(tenant_id).await?.is_some() {
                return Ok(Some(tenant_id.to_string()));
            }
        }
        if let Some(customer_id) = obj["customer"].as_str() {
            if let Some(tenant) = self
                .tenants
                .find_tenant_by_billing_customer(customer_id)
                .await?
            {
                return Ok(Some(tenant.id));
            }
        }
        Ok(None)
    }

    /// checkout.session.completed → subscription ACTIVE with provider ids
    async fn checkout_completed(&self, obj: &Value, now: i64) -> ServiceResult<WebhookOutcome> {
        let tenant_id = obj["client_reference_id"]
            .as_str()
            .or_else(|| obj["metadata"]["tenant_id"].as_str());
        let tenant = match tenant_id {
            Some(id) => self.tenants.find_tenant(id).await?,
            None => match obj["customer"].as_str() {
                Some(customer) => self.tenants.find_tenant_by_billing_customer(customer).await?,
                None => None,
            },
        };
        let Some(tenant) = tenant else {
            tracing::warn!(tenant_id = ?tenant_id, "checkout.session.completed for unknown tenant");
            return Ok(WebhookOutcome::Ignored);
        };

        let customer_id = obj["customer"].as_str();
        let provider_sub_id = obj["subscription"].as_str();
        let existing = self.subscriptions.find_subscription(&tenant.id).await?;

        let requested_plan = match obj["metadata"]["plan"].as_str() {
            Some(plan) => self.subscriptions.find_plan(plan).await?.map(|p| p.id),
            None => None,
        };
        let plan_id = requested_plan
            .or_else(|| existing.as_ref().map(|s| s.plan_id.clone()))
            .unwrap_or_else(|| FALLBACK_PLAN.to_string());

        let sub = match existing {
            Some(mut sub) => {
                sub.plan_id = plan_id.clone();
                sub.status = SubscriptionStatus::Active;
                sub.provider_customer_id = customer_id.map(String::from).or(sub.provider_customer_id);
                sub.provider_subscription_id =
                    provider_sub_id.map(String::from).or(sub.provider_subscription_id);
                sub.updated_at = now;
                sub
            }
            None => Subscription {
                id: snowflake_id(),
                tenant_id: tenant.id.clone(),
                plan_id: plan_id.clone(),
                status: SubscriptionStatus::Active,
                trial_ends_at: None,
                current_period_end: None,
                provider_customer_id: customer_id.map(String::from),
                provider_subscription_id: provider_sub_id.map(String::from),
                created_at: now,
                updated_at: now,
            },
        };
        self.subscriptions.upsert_subscription(&sub).await?;

        if let Some(customer_id) = customer_id {
            if tenant.billing_customer_id.as_deref() != Some(customer_id) {
                self.tenants.set_billing_customer(&tenant.id, customer_id).await?;
            }
        }
        if tenant.status != TenantStatus::Active {
            self.tenants
                .update_tenant_status(&tenant.id, TenantStatus::Active)
                .await?;
        }

        tracing::info!(
            tenant_id = %tenant.id,
            plan = %plan_id,
            "Subscription activated via checkout"
        );
        let detail = serde_json::json!({ "plan": plan_id, "subscription_id": provider_sub_id });
        audit(&*self.audit, &tenant.id, "subscription_activated", Some(detail), now).await;
        Ok(WebhookOutcome::Processed)
    }

    /// customer.subscription.updated → mapped status, period end, plan
    async fn subscription_updated(&self, obj: &Value, now: i64) -> ServiceResult<WebhookOutcome> {
        let provider_status = obj["status"].as_str().unwrap_or("");
        let Some(status) = map_provider_status(provider_status) else {
            tracing::warn!(status = provider_status, "Unmapped provider subscription status");
            return Ok(WebhookOutcome::Ignored);
        };
        let Some(tenant_id) = self.resolve_tenant(obj["id"].as_str(), obj).await? else {
            tracing::warn!(subscription_id = ?obj["id"].as_str(), "Subscription update for unknown tenant");
            return Ok(WebhookOutcome::Ignored);
        };
        let Some(mut sub) = self.subscriptions.find_subscription(&tenant_id).await? else {
            tracing::warn!(tenant_id = %tenant_id, "Subscription update but no local subscription");
            return Ok(WebhookOutcome::Ignored);
        };

        sub.status = status;
        if let Some(end) = seconds_to_millis(&obj["current_period_end"])
            .or_else(|| seconds_to_millis(&obj["items"]["data"][0]["current_period_end"]))
        {
            sub.current_period_end = Some(end);
        }
        if let Some(plan) = obj["metadata"]["plan"].as_str() {
            if let Some(plan) = self.subscriptions.find_plan(plan).await? {
                sub.plan_id = plan.id;
            }
        }
        if let Some(sub_id) = obj["id"].as_str() {
            sub.provider_subscription_id = Some(sub_id.to_string());
        }
        sub.updated_at = now;
        self.subscriptions.upsert_subscription(&sub).await?;

        tracing::info!(tenant_id = %tenant_id, status = status.as_db(), "Subscription updated");
        Ok(WebhookOutcome::Processed)
    }

    /// customer.subscription.deleted → CANCELLED
    async fn subscription_deleted(&self, obj: &Value, now: i64) -> ServiceResult<WebhookOutcome> {
        let Some(tenant_id) = self.resolve_tenant(obj["id"].as_str(), obj).await? else {
            return Ok(WebhookOutcome::Ignored);
        };
        if !self
            .subscriptions
            .update_subscription_status(&tenant_id, SubscriptionStatus::Cancelled, now)
            .await?
        {
            return Ok(WebhookOutcome::Ignored);
        }

        tracing::info!(tenant_id = %tenant_id, "Subscription cancelled by provider");
        audit(&*self.audit, &tenant_id, "subscription_cancelled", None, now).await;
        Ok(WebhookOutcome::Processed)
    }

    /// invoice.paid → ACTIVE, period end from the first invoice line
    async fn invoice_paid(&self, obj: &Value, now: i64) -> ServiceResult<WebhookOutcome> {
        let Some(tenant_id) = self.resolve_tenant(invoice_subscription(obj), obj).await? else {
            return Ok(WebhookOutcome::Ignored);
        };
        let Some(mut sub) = self.subscriptions.find_subscription(&tenant_id).await? else {
            return Ok(WebhookOutcome::Ignored);
        };

        sub.status = SubscriptionStatus::Active;
        if let Some(end) = seconds_to_millis(&obj["lines"]["data"][0]["period"]["end"]) {
            sub.current_period_end = Some(end);
        }
        sub.updated_at = now;
        self.subscriptions.upsert_subscription(&sub).await?;

        tracing::info!(tenant_id = %tenant_id, "Invoice paid");
        Ok(WebhookOutcome::Processed)
    }

    /// invoice.payment_failed → PAST_DUE
    async fn invoice_payment_failed(&self, obj: &Value, now: i64) -> ServiceResult<WebhookOutcome> {
        let Some(tenant_id) = self.resolve_tenant(invoice_subscription(obj), obj).await? else {
            return Ok(WebhookOutcome::Ignored);
        };
        if !self
            .subscriptions
            .update_subscription_status(&tenant_id, SubscriptionStatus::PastDue, now)
            .await?
        {
            return Ok(WebhookOutcome::Ignored);
        }

        tracing::warn!(tenant_id = %tenant_id, "Invoice payment failed, subscription past due");
        audit(&*self.audit, &tenant_id, "payment_failed", None, now).await;
        Ok(WebhookOutcome::Processed)
    }
}

/// Subscription id on an invoice (top level, or under `parent` in newer API versions)
fn invoice_subscription(obj: &Value) -> Option<&str> {
    obj["subscription"]
        .as_str()
        .or_else(|| obj["parent"]["subscription_details"]["subscription"].as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_status_mapping() {
        assert_eq!(map_provider_status("trialing"), Some(SubscriptionStatus::Trialing));
        assert_eq!(map_provider_status("active"), Some(SubscriptionStatus::Active));
        assert_eq!(map_provider_status("past_due"), Some(SubscriptionStatus::PastDue));
        assert_eq!(map_provider_status("unpaid"), Some(SubscriptionStatus::PastDue));
        assert_eq!(map_provider_status("canceled"), Some(SubscriptionStatus::Cancelled));
        assert_eq!(
            map_provider_status("incomplete_expired"),
            Some(SubscriptionStatus::Expired)
        );
        assert_eq!(map_provider_status("incomplete"), None);
    }

    #[test]
    fn test_invoice_subscription_lookup() {
        let legacy = serde_json::json!({ "subscription": "sub_1" });
        assert_eq!(invoice_subscription(&legacy), Some("sub_1"));
        let nested = serde_json::json!({
            "parent": { "subscription_details": { "subscription": "sub_2" } }
        });
        assert_eq!(invoice_subscription(&nested), Some("sub_2"));
        assert_eq!(invoice_subscription(&serde_json::json!({})), None);
    }
}
