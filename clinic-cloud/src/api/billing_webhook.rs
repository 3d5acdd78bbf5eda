//! Billing webhook handler
//!
//! POST /billing/webhook. The raw body is required for signature verification

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use shared::error::ApiResponse;

use crate::billing::WebhookOutcome;
use crate::error::ServiceError;
use crate::state::AppState;

/// 200 once the event is handled or known, 4xx for a rejected delivery,
/// 5xx when the store fails and the provider should retry.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiResponse<WebhookOutcome>, ServiceError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    let outcome = state.services.webhooks.process(&body, signature).await?;
    Ok(ApiResponse::success(outcome))
}
