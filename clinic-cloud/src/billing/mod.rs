//! Billing provider integration
//!
//! [`BillingProvider`] is the outbound seam (customers, hosted checkout,
//! billing portal); [`webhook`] reconciles inbound provider events into
//! local subscription state.

pub mod stripe;
pub mod webhook;

pub use stripe::StripeClient;
pub use webhook::{WebhookOutcome, WebhookProcessor};

use async_trait::async_trait;

use crate::BoxError;

/// Hosted checkout request for one tenant and plan
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub customer_id: &'a str,
    pub tenant_id: &'a str,
    pub price_id: &'a str,
    pub plan_id: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Create a customer, returning the provider's customer id
    async fn create_customer(&self, email: &str, tenant_id: &str) -> Result<String, BoxError>;
    /// Create a subscription checkout session, returning its URL
    async fn create_checkout_session(&self, req: &CheckoutRequest<'_>) -> Result<String, BoxError>;
    /// Create a billing portal session, returning its URL
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, BoxError>;
}
