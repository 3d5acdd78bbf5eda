mod common;

use clinic_cloud::config::Config;
use common::{Harness, NOW, test_config};
use shared::error::ErrorCode;
use shared::models::{
    AppointmentStatus, ComplianceDocumentCreate, Plan, Subscription, SubscriptionStatus,
    UsageMetric,
};
use shared::util::DAY_MS;

/// 2026-03-01T00:00:00Z and 2026-04-01T00:00:00Z
const MARCH_START: i64 = 1_772_323_200_000;
const APRIL_START: i64 = 1_775_001_600_000;

fn tiny_plan() -> Plan {
    Plan {
        id: "tiny".into(),
        name: "Tiny".into(),
        max_users: 2,
        max_patients: 2,
        max_appointments_per_month: 2,
        max_storage_gb: 1,
        price_monthly_cents: 100,
        provider_price_id: None,
    }
}

async fn trialing(h: &Harness, tenant_id: &str, plan_id: &str) {
    h.tenant(tenant_id).await;
    h.services
        .subscriptions
        .start_trial(tenant_id, plan_id)
        .await
        .unwrap();
}

#[tokio::test]
async fn expired_trial_reads_inactive_and_persists_expired() {
    let h = Harness::new();
    trialing(&h, "t1", "basic").await;
    let svc = &h.services.subscriptions;

    assert!(svc.is_subscription_active("t1").await.unwrap());

    // Trial ended yesterday
    h.clock.advance(15 * DAY_MS);
    assert!(!svc.is_subscription_active("t1").await.unwrap());

    let stored = h
        .repos
        .subscriptions
        .find_subscription("t1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, SubscriptionStatus::Expired);

    // Repeated reads stay inactive and keep the same status
    assert!(!svc.is_subscription_active("t1").await.unwrap());
    let again = svc.get_subscription("t1").await.unwrap().unwrap();
    assert_eq!(again.status, SubscriptionStatus::Expired);
}

#[tokio::test]
async fn trial_ending_exactly_now_is_expired() {
    let h = Harness::new();
    trialing(&h, "t1", "basic").await;
    let svc = &h.services.subscriptions;

    h.clock.advance(14 * DAY_MS - 1);
    assert!(svc.is_subscription_active("t1").await.unwrap());

    h.clock.advance(1);
    assert!(!svc.is_subscription_active("t1").await.unwrap());
    let stored = h
        .repos
        .subscriptions
        .find_subscription("t1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, SubscriptionStatus::Expired);
    assert_eq!(stored.updated_at, NOW + 14 * DAY_MS);
}

#[tokio::test]
async fn trial_without_end_date_stays_active() {
    let h = Harness::new();
    h.tenant("t1").await;
    h.repos
        .subscriptions
        .upsert_subscription(&Subscription {
            id: 1,
            tenant_id: "t1".into(),
            plan_id: "basic".into(),
            status: SubscriptionStatus::Trialing,
            trial_ends_at: None,
            current_period_end: None,
            provider_customer_id: None,
            provider_subscription_id: None,
            created_at: NOW,
            updated_at: NOW,
        })
        .await
        .unwrap();
    let svc = &h.services.subscriptions;

    h.clock.advance(365 * DAY_MS);
    assert!(svc.is_subscription_active("t1").await.unwrap());
    let sub = svc.get_subscription("t1").await.unwrap().unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Trialing);
    assert_eq!(svc.get_trial_days_remaining("t1").await.unwrap(), None);
}

#[tokio::test]
async fn missing_or_cancelled_subscription_is_inactive() {
    let h = Harness::new();
    let svc = &h.services.subscriptions;
    assert!(!svc.is_subscription_active("nobody").await.unwrap());

    trialing(&h, "t1", "basic").await;
    svc.cancel("t1").await.unwrap();
    assert!(!svc.is_subscription_active("t1").await.unwrap());
}

#[tokio::test]
async fn usage_limit_blocks_at_the_ceiling() {
    let h = Harness::new();
    h.store.insert_plan(tiny_plan());
    trialing(&h, "t1", "tiny").await;
    let svc = &h.services.subscriptions;

    h.user("t1", 1, true);
    h.user("t1", 2, false);
    let check = svc.check_usage_limit("t1", UsageMetric::Users).await.unwrap();
    assert_eq!((check.current, check.limit), (1, 2));
    assert!(check.allowed);

    h.user("t1", 3, true);
    let check = svc.check_usage_limit("t1", UsageMetric::Users).await.unwrap();
    assert_eq!((check.current, check.limit), (2, 2));
    assert!(!check.allowed);

    // Other tenants' users do not count
    h.user("t2", 4, true);
    let check = svc.check_usage_limit("t1", UsageMetric::Users).await.unwrap();
    assert_eq!(check.current, 2);
}

#[tokio::test]
async fn require_usage_rejects_at_the_ceiling() {
    let h = Harness::new();
    h.store.insert_plan(tiny_plan());
    trialing(&h, "t1", "tiny").await;
    let svc = &h.services.subscriptions;

    h.user("t1", 1, true);
    let check = svc.require_usage("t1", UsageMetric::Users).await.unwrap();
    assert_eq!(check.current, 1);

    h.user("t1", 2, true);
    let err = svc.require_usage("t1", UsageMetric::Users).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UsageLimitReached));
    let app: shared::error::AppError = err.into();
    let details = app.details.unwrap();
    assert_eq!(details["metric"], "users");
    assert_eq!(details["current"], 2);
    assert_eq!(details["limit"], 2);
}

#[tokio::test]
async fn require_active_follows_subscription_state() {
    let h = Harness::new();
    let svc = &h.services.subscriptions;

    let err = svc.require_active("t1").await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::SubscriptionInactive));

    trialing(&h, "t1", "basic").await;
    svc.require_active("t1").await.unwrap();

    h.clock.advance(14 * DAY_MS);
    let err = svc.require_active("t1").await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::SubscriptionInactive));
}

#[tokio::test]
async fn patient_limit_counts_only_active_patients() {
    let h = Harness::new();
    h.store.insert_plan(tiny_plan());
    trialing(&h, "t1", "tiny").await;

    h.patient(common::patient("t1", 1, "Ana", "Ruiz"));
    let mut inactive = common::patient("t1", 2, "Luis", "Gomez");
    inactive.is_active = false;
    h.patient(inactive);

    let check = h
        .services
        .subscriptions
        .check_usage_limit("t1", UsageMetric::Patients)
        .await
        .unwrap();
    assert_eq!(check.current, 1);
    assert!(check.allowed);
}

#[tokio::test]
async fn appointment_usage_uses_the_calendar_month() {
    let h = Harness::new();
    h.store.insert_plan(tiny_plan());
    trialing(&h, "t1", "tiny").await;

    // Counted by creation time, not start time
    h.appointment("t1", 1, 1, APRIL_START + DAY_MS, AppointmentStatus::Scheduled, MARCH_START);
    h.appointment("t1", 2, 1, NOW, AppointmentStatus::Completed, MARCH_START - 1);
    h.appointment("t1", 3, 1, NOW, AppointmentStatus::Cancelled, APRIL_START);
    h.appointment("t1", 4, 1, NOW, AppointmentStatus::Scheduled, NOW);

    let check = h
        .services
        .subscriptions
        .check_usage_limit("t1", UsageMetric::Appointments)
        .await
        .unwrap();
    assert_eq!(check.current, 2);
    assert!(!check.allowed);
}

#[tokio::test]
async fn storage_usage_is_truncated_megabytes() {
    let h = Harness::new();
    trialing(&h, "t1", "basic").await;

    for size in [5 * 1024 * 1024, 512 * 1024] {
        h.services
            .compliance
            .create(
                "t1",
                ComplianceDocumentCreate {
                    staff_id: None,
                    name: "scan".into(),
                    document_type: "license".into(),
                    issue_date: NOW,
                    expiration_date: None,
                    file_url: Some("https://files.test/scan.pdf".into()),
                    file_size: Some(size),
                    mime_type: Some("application/pdf".into()),
                    notes: None,
                },
            )
            .await
            .unwrap();
    }

    let check = h
        .services
        .subscriptions
        .check_usage_limit("t1", UsageMetric::Storage)
        .await
        .unwrap();
    assert_eq!(check.current, 5);
    assert_eq!(check.limit, 2 * 1024);
    assert!(check.allowed);
}

#[tokio::test]
async fn usage_without_subscription_fails() {
    let h = Harness::new();
    let err = h
        .services
        .subscriptions
        .check_usage_limit("t1", UsageMetric::Users)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::TenantNoSubscription));
}

#[tokio::test]
async fn usage_summary_reports_every_metric() {
    let h = Harness::new();
    trialing(&h, "t1", "professional").await;
    h.user("t1", 1, true);

    let summary = h.services.subscriptions.usage_summary("t1").await.unwrap();
    assert_eq!(summary.plan_id, "professional");
    let metrics: Vec<UsageMetric> = summary.metrics.iter().map(|m| m.metric).collect();
    assert_eq!(metrics, UsageMetric::ALL.to_vec());
    assert_eq!(summary.metrics[0].current, 1);
    assert_eq!(summary.metrics[0].limit, 10);
}

#[tokio::test]
async fn trial_days_remaining_is_never_negative() {
    let h = Harness::new();
    let svc = &h.services.subscriptions;
    assert_eq!(svc.get_trial_days_remaining("t1").await.unwrap(), None);

    trialing(&h, "t1", "basic").await;
    assert_eq!(svc.get_trial_days_remaining("t1").await.unwrap(), Some(14));

    // Partial days round up
    h.clock.advance(13 * DAY_MS + DAY_MS / 2);
    assert_eq!(svc.get_trial_days_remaining("t1").await.unwrap(), Some(1));

    h.clock.advance(30 * DAY_MS);
    assert_eq!(svc.get_trial_days_remaining("t1").await.unwrap(), Some(0));

    // Once the expiry has been applied it is no longer a trial
    svc.get_subscription("t1").await.unwrap();
    assert_eq!(svc.get_trial_days_remaining("t1").await.unwrap(), None);
}

#[tokio::test]
async fn trial_days_remaining_is_none_when_not_trialing() {
    let h = Harness::new();
    trialing(&h, "t1", "basic").await;
    h.services.subscriptions.cancel("t1").await.unwrap();
    assert_eq!(
        h.services
            .subscriptions
            .get_trial_days_remaining("t1")
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn extend_trial_requires_a_subscription() {
    let h = Harness::new();
    h.tenant("t1").await;
    let err = h
        .services
        .subscriptions
        .extend_trial("t1", 7)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::TenantNoSubscription));
}

#[tokio::test]
async fn extend_trial_revives_an_expired_trial() {
    let h = Harness::new();
    trialing(&h, "t1", "basic").await;
    let svc = &h.services.subscriptions;

    h.clock.advance(20 * DAY_MS);
    assert!(!svc.is_subscription_active("t1").await.unwrap());

    let sub = svc.extend_trial("t1", 7).await.unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Trialing);
    assert_eq!(sub.trial_ends_at, Some(NOW + 27 * DAY_MS));
    assert!(svc.is_subscription_active("t1").await.unwrap());
    assert_eq!(svc.get_trial_days_remaining("t1").await.unwrap(), Some(7));
}

#[tokio::test]
async fn extend_trial_rejects_out_of_range_days() {
    let h = Harness::new();
    trialing(&h, "t1", "basic").await;
    let svc = &h.services.subscriptions;

    for days in [0, -3, i64::MAX / 1000, i64::MAX] {
        let err = svc.extend_trial("t1", days).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ValidationFailed));
    }
    let sub = svc.get_subscription("t1").await.unwrap().unwrap();
    assert_eq!(sub.trial_ends_at, Some(NOW + 14 * DAY_MS));
}

#[tokio::test]
async fn start_trial_rejects_out_of_range_length() {
    for trial_days in [0, i64::MAX] {
        let h = Harness::with_config(&Config {
            trial_days,
            ..test_config()
        });
        h.tenant("t1").await;
        let err = h
            .services
            .subscriptions
            .start_trial("t1", "basic")
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ValidationFailed));
        let stored = h.repos.subscriptions.find_subscription("t1").await.unwrap();
        assert!(stored.is_none());
    }
}

#[tokio::test]
async fn change_plan_validates_plan() {
    let h = Harness::new();
    trialing(&h, "t1", "basic").await;
    let svc = &h.services.subscriptions;

    let err = svc.change_plan("t1", "platinum").await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::PlanNotFound));

    let sub = svc.change_plan("t1", "enterprise").await.unwrap();
    assert_eq!(sub.plan_id, "enterprise");
    let check = svc
        .check_usage_limit("t1", UsageMetric::Users)
        .await
        .unwrap();
    assert_eq!(check.limit, 100);
}

#[tokio::test]
async fn register_tenant_starts_a_trial() {
    let h = Harness::new();
    let svc = &h.services.subscriptions;

    let (tenant, sub) = svc
        .register_tenant("Sonrisa Dental", "Admin@Sonrisa.test", "basic")
        .await
        .unwrap();
    assert_eq!(tenant.email, "admin@sonrisa.test");
    assert_eq!(sub.tenant_id, tenant.id);
    assert_eq!(sub.status, SubscriptionStatus::Trialing);
    assert_eq!(sub.trial_ends_at, Some(NOW + 14 * DAY_MS));

    let err = svc
        .register_tenant("Other", "other@clinic.test", "platinum")
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::PlanNotFound));
}

#[tokio::test]
async fn checkout_creates_the_customer_once() {
    let h = Harness::new();
    h.store.insert_plan(Plan {
        provider_price_id: Some("price_pro".into()),
        ..clinic_cloud::db::memory::default_plans()
            .into_iter()
            .find(|p| p.id == "professional")
            .unwrap()
    });
    trialing(&h, "t1", "basic").await;
    let svc = &h.services.subscriptions;

    let url = svc.start_checkout("t1", "professional").await.unwrap();
    assert_eq!(url, "https://checkout.test/professional");
    svc.start_checkout("t1", "professional").await.unwrap();

    assert_eq!(h.billing.customers.lock().len(), 1);
    let checkouts = h.billing.checkouts.lock().clone();
    assert_eq!(
        checkouts,
        vec![
            ("cus_t1".to_string(), "price_pro".to_string()),
            ("cus_t1".to_string(), "price_pro".to_string()),
        ]
    );

    let portal = svc.billing_portal("t1").await.unwrap();
    assert_eq!(portal, "https://portal.test/cus_t1");
}

#[tokio::test]
async fn checkout_requires_a_provider_price() {
    let h = Harness::new();
    trialing(&h, "t1", "basic").await;
    let svc = &h.services.subscriptions;

    let err = svc.start_checkout("t1", "basic").await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::PaymentSetupFailed));

    let err = svc.billing_portal("t1").await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::PaymentSetupFailed));
}
