mod common;

use common::{Harness, NOW, WEBHOOK_SECRET};
use clinic_cloud::billing::WebhookOutcome;
use clinic_cloud::billing::stripe::sign_webhook_payload;
use clinic_cloud::clock::Clock;
use shared::error::ErrorCode;
use shared::models::SubscriptionStatus;
use shared::util::DAY_MS;

/// Delivery signed at the harness clock's current time
async fn deliver(h: &Harness, event: serde_json::Value) -> WebhookOutcome {
    let payload = serde_json::to_vec(&event).unwrap();
    let sig = sign_webhook_payload(&payload, WEBHOOK_SECRET, h.clock.now_millis() / 1000);
    h.services
        .webhooks
        .process(&payload, Some(&sig))
        .await
        .unwrap()
}

async fn status(h: &Harness, tenant_id: &str) -> SubscriptionStatus {
    h.repos
        .subscriptions
        .find_subscription(tenant_id)
        .await
        .unwrap()
        .unwrap()
        .status
}

#[tokio::test]
async fn trial_to_paid_lifecycle() {
    let h = Harness::new();
    h.tenant("t1").await;
    h.services
        .subscriptions
        .start_trial("t1", "basic")
        .await
        .unwrap();

    let outcome = deliver(
        &h,
        serde_json::json!({
            "id": "evt_checkout",
            "type": "checkout.session.completed",
            "data": { "object": {
                "client_reference_id": "t1",
                "customer": "cus_1",
                "subscription": "sub_1",
                "metadata": { "plan": "professional" }
            }}
        }),
    )
    .await;
    assert_eq!(outcome, WebhookOutcome::Processed);

    let sub = h
        .services
        .subscriptions
        .get_subscription("t1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert_eq!(sub.plan_id, "professional");
    assert_eq!(sub.provider_subscription_id.as_deref(), Some("sub_1"));
    let tenant = h.repos.tenants.find_tenant("t1").await.unwrap().unwrap();
    assert_eq!(tenant.billing_customer_id.as_deref(), Some("cus_1"));

    // Once paid the trial end no longer matters
    h.clock.advance(30 * DAY_MS);
    assert!(h.services.subscriptions.is_subscription_active("t1").await.unwrap());

    let outcome = deliver(
        &h,
        serde_json::json!({
            "id": "evt_failed",
            "type": "invoice.payment_failed",
            "data": { "object": { "subscription": "sub_1", "customer": "cus_1" } }
        }),
    )
    .await;
    assert_eq!(outcome, WebhookOutcome::Processed);
    assert_eq!(status(&h, "t1").await, SubscriptionStatus::PastDue);
    assert!(!h.services.subscriptions.is_subscription_active("t1").await.unwrap());

    deliver(
        &h,
        serde_json::json!({
            "id": "evt_paid",
            "type": "invoice.paid",
            "data": { "object": {
                "subscription": "sub_1",
                "lines": { "data": [ { "period": { "end": 1_780_000_000 } } ] }
            }}
        }),
    )
    .await;
    let sub = h.repos.subscriptions.find_subscription("t1").await.unwrap().unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert_eq!(sub.current_period_end, Some(1_780_000_000_000));

    deliver(
        &h,
        serde_json::json!({
            "id": "evt_deleted",
            "type": "customer.subscription.deleted",
            "data": { "object": { "id": "sub_1", "customer": "cus_1" } }
        }),
    )
    .await;
    assert_eq!(status(&h, "t1").await, SubscriptionStatus::Cancelled);
}

#[tokio::test]
async fn provider_status_updates_are_mapped() {
    let h = Harness::new();
    h.tenant("t1").await;
    deliver(
        &h,
        serde_json::json!({
            "id": "evt_0",
            "type": "checkout.session.completed",
            "data": { "object": { "metadata": { "tenant_id": "t1" }, "subscription": "sub_9" } }
        }),
    )
    .await;

    let cases = [
        ("trialing", SubscriptionStatus::Trialing),
        ("past_due", SubscriptionStatus::PastDue),
        ("unpaid", SubscriptionStatus::PastDue),
        ("active", SubscriptionStatus::Active),
        ("incomplete_expired", SubscriptionStatus::Expired),
        ("canceled", SubscriptionStatus::Cancelled),
    ];
    for (i, (provider_status, expected)) in cases.into_iter().enumerate() {
        let outcome = deliver(
            &h,
            serde_json::json!({
                "id": format!("evt_upd_{i}"),
                "type": "customer.subscription.updated",
                "data": { "object": { "id": "sub_9", "status": provider_status } }
            }),
        )
        .await;
        assert_eq!(outcome, WebhookOutcome::Processed, "{provider_status}");
        assert_eq!(status(&h, "t1").await, expected, "{provider_status}");
    }

    let outcome = deliver(
        &h,
        serde_json::json!({
            "id": "evt_upd_unknown",
            "type": "customer.subscription.updated",
            "data": { "object": { "id": "sub_9", "status": "paused" } }
        }),
    )
    .await;
    assert_eq!(outcome, WebhookOutcome::Ignored);
}

#[tokio::test]
async fn redelivery_has_no_effect() {
    let h = Harness::new();
    h.tenant("t1").await;
    let event = serde_json::json!({
        "id": "evt_once",
        "type": "checkout.session.completed",
        "data": { "object": { "client_reference_id": "t1", "subscription": "sub_1" } }
    });
    assert_eq!(deliver(&h, event.clone()).await, WebhookOutcome::Processed);

    h.services.subscriptions.cancel("t1").await.unwrap();
    assert_eq!(deliver(&h, event).await, WebhookOutcome::Duplicate);
    assert_eq!(status(&h, "t1").await, SubscriptionStatus::Cancelled);
}

#[tokio::test]
async fn unknown_tenant_and_event_type_are_ignored() {
    let h = Harness::new();
    let outcome = deliver(
        &h,
        serde_json::json!({
            "id": "evt_a",
            "type": "checkout.session.completed",
            "data": { "object": { "client_reference_id": "ghost" } }
        }),
    )
    .await;
    assert_eq!(outcome, WebhookOutcome::Ignored);

    let outcome = deliver(
        &h,
        serde_json::json!({ "id": "evt_b", "type": "charge.refunded", "data": { "object": {} } }),
    )
    .await;
    assert_eq!(outcome, WebhookOutcome::Ignored);
}

#[tokio::test]
async fn stale_or_forged_signatures_are_rejected() {
    let h = Harness::new();
    let payload = br#"{"id":"evt_x","type":"invoice.paid","data":{"object":{}}}"#;

    let stale = sign_webhook_payload(payload, WEBHOOK_SECRET, NOW / 1000 - 301);
    let err = h
        .services
        .webhooks
        .process(payload, Some(&stale))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::WebhookSignatureInvalid));

    let forged = sign_webhook_payload(payload, "whsec_other", NOW / 1000);
    let err = h
        .services
        .webhooks
        .process(payload, Some(&forged))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::WebhookSignatureInvalid));

    let extreme = "t=-9223372036854775808,v1=00";
    let err = h
        .services
        .webhooks
        .process(payload, Some(extreme))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::WebhookSignatureInvalid));

    let err = h.services.webhooks.process(payload, None).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::WebhookSignatureInvalid));
}
