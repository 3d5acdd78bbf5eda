//! Stripe integration via REST API (no SDK dependency)

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{BillingProvider, CheckoutRequest};
use crate::BoxError;

const STRIPE_API: &str = "https://api.stripe.com/v1";

/// Maximum age of a signed webhook, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Stripe REST client; one instance per process, shared through `AppState`
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.into(),
        }
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<serde_json::Value, BoxError> {
        let resp: serde_json::Value = self
            .http
            .post(format!("{STRIPE_API}{path}"))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await?
            .json()
            .await?;
        Ok(resp)
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn create_customer(&self, email: &str, tenant_id: &str) -> Result<String, BoxError> {
        let resp = self
            .post_form(
                "/customers",
                &[("email", email), ("metadata[tenant_id]", tenant_id)],
            )
            .await?;
        resp["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| format!("Stripe create_customer failed: {resp}").into())
    }

    async fn create_checkout_session(&self, req: &CheckoutRequest<'_>) -> Result<String, BoxError> {
        let resp = self
            .post_form(
                "/checkout/sessions",
                &[
                    ("customer", req.customer_id),
                    ("mode", "subscription"),
                    ("client_reference_id", req.tenant_id),
                    ("line_items[0][price]", req.price_id),
                    ("line_items[0][quantity]", "1"),
                    ("success_url", req.success_url),
                    ("cancel_url", req.cancel_url),
                    ("metadata[plan]", req.plan_id),
                    ("metadata[tenant_id]", req.tenant_id),
                ],
            )
            .await?;
        resp["url"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| format!("Stripe create_checkout failed: {resp}").into())
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, BoxError> {
        let resp = self
            .post_form(
                "/billing_portal/sessions",
                &[("customer", customer_id), ("return_url", return_url)],
            )
            .await?;
        resp["url"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| format!("Stripe billing portal failed: {resp}").into())
    }
}

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>`) against the raw
/// payload. `now_secs` is the verifier's current Unix time.
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    now_secs: i64,
) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signatures: Vec<&str> = Vec::new();
    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }

    if timestamp.is_empty() || signatures.is_empty() {
        return Err("Invalid Stripe-Signature header");
    }

    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    if now_secs.abs_diff(ts) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err("Webhook timestamp outside tolerance");
    }

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Any v1 entry may match (secret rotation sends several)
    for sig in signatures {
        let Ok(sig_bytes) = hex::decode(sig) else {
            continue;
        };
        if mac.clone().verify_slice(&sig_bytes).is_ok() {
            return Ok(());
        }
    }
    Err("Webhook signature mismatch")
}

/// Build a valid signature header; used by tests and local replay tooling
pub fn sign_webhook_payload(payload: &[u8], secret: &str, timestamp_secs: i64) -> String {
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return String::new(),
    };
    mac.update(timestamp_secs.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let sig = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp_secs},v1={sig}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_773_576_000;

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign_webhook_payload(payload, SECRET, NOW);
        assert!(verify_webhook_signature(payload, &header, SECRET, NOW + 10).is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let header = sign_webhook_payload(br#"{"id":"evt_1"}"#, SECRET, NOW);
        assert_eq!(
            verify_webhook_signature(br#"{"id":"evt_2"}"#, &header, SECRET, NOW),
            Err("Webhook signature mismatch")
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = b"{}";
        let header = sign_webhook_payload(payload, "other", NOW);
        assert!(verify_webhook_signature(payload, &header, SECRET, NOW).is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"{}";
        let header = sign_webhook_payload(payload, SECRET, NOW);
        assert_eq!(
            verify_webhook_signature(payload, &header, SECRET, NOW + SIGNATURE_TOLERANCE_SECS + 1),
            Err("Webhook timestamp outside tolerance")
        );
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert!(verify_webhook_signature(b"{}", "garbage", SECRET, NOW).is_err());
        assert!(verify_webhook_signature(b"{}", "t=abc,v1=00", SECRET, NOW).is_err());
    }

    #[test]
    fn test_extreme_timestamp_rejected() {
        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={t},v1=00");
            assert_eq!(
                verify_webhook_signature(b"{}", &header, SECRET, NOW),
                Err("Webhook timestamp outside tolerance")
            );
        }
    }

    #[test]
    fn test_second_v1_entry_may_match() {
        let payload = b"{}";
        let good = sign_webhook_payload(payload, SECRET, NOW);
        let sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={NOW},v1=deadbeef,v1={sig}");
        assert!(verify_webhook_signature(payload, &header, SECRET, NOW).is_ok());
    }
}
