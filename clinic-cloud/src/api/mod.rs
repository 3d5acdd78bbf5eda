//! HTTP routes for clinic-cloud
//!
//! Only operational endpoints live here; the tenant console API is a
//! separate concern.

pub mod billing_webhook;
pub mod health;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    // Billing webhook (signature-verified, raw body)
    let webhook = Router::new().route("/billing/webhook", post(billing_webhook::handle_webhook));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(webhook)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
