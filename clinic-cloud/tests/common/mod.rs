//! Shared fixtures: memory store, fixed clock and a recording billing provider
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;

use clinic_cloud::BoxError;
use clinic_cloud::billing::{BillingProvider, CheckoutRequest};
use clinic_cloud::clock::FixedClock;
use clinic_cloud::config::Config;
use clinic_cloud::db::{MemoryStore, Repositories};
use clinic_cloud::services::Services;
use shared::models::{Appointment, AppointmentStatus, Patient, StaffUser, Tenant, TenantStatus};
use shared::util::DAY_MS;

/// 2026-03-15T12:00:00Z
pub const NOW: i64 = 1_773_576_000_000;
pub const WEBHOOK_SECRET: &str = "whsec_test";

#[derive(Default)]
pub struct RecordingBilling {
    pub customers: Mutex<Vec<String>>,
    pub checkouts: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl BillingProvider for RecordingBilling {
    async fn create_customer(&self, email: &str, tenant_id: &str) -> Result<String, BoxError> {
        self.customers.lock().push(email.to_string());
        Ok(format!("cus_{tenant_id}"))
    }

    async fn create_checkout_session(&self, req: &CheckoutRequest<'_>) -> Result<String, BoxError> {
        self.checkouts
            .lock()
            .push((req.customer_id.to_string(), req.price_id.to_string()));
        Ok(format!("https://checkout.test/{}", req.plan_id))
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        _return_url: &str,
    ) -> Result<String, BoxError> {
        Ok(format!("https://portal.test/{customer_id}"))
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        http_port: 0,
        environment: "development".into(),
        stripe_secret_key: "sk_test".into(),
        stripe_webhook_secret: WEBHOOK_SECRET.into(),
        billing_success_url: "http://localhost/success".into(),
        billing_cancel_url: "http://localhost/cancel".into(),
        billing_portal_return_url: "http://localhost/billing".into(),
        trial_days: 14,
        segment_preview_limit: 2,
        compliance_sweep_interval_secs: 0,
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub repos: Repositories,
    pub clock: Arc<FixedClock>,
    pub billing: Arc<RecordingBilling>,
    pub services: Services,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(&test_config())
    }

    pub fn with_config(config: &Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let repos = Repositories::from_store(store.clone());
        let clock = Arc::new(FixedClock::new(NOW));
        let billing = Arc::new(RecordingBilling::default());
        let services = Services::new(&repos, billing.clone(), clock.clone(), config);
        Self {
            store,
            repos,
            clock,
            billing,
            services,
        }
    }

    pub async fn tenant(&self, id: &str) -> Tenant {
        let tenant = Tenant {
            id: id.to_string(),
            name: format!("Clinic {id}"),
            email: format!("{id}@clinic.test"),
            status: TenantStatus::Active,
            billing_customer_id: None,
            created_at: NOW - 100 * DAY_MS,
        };
        self.repos.tenants.create_tenant(&tenant).await.unwrap();
        tenant
    }

    pub fn user(&self, tenant_id: &str, id: i64, is_active: bool) {
        self.store.insert_user(StaffUser {
            id,
            tenant_id: tenant_id.to_string(),
            name: format!("Staff {id}"),
            email: format!("staff{id}@clinic.test"),
            role: "dentist".into(),
            is_active,
            created_at: NOW - DAY_MS,
        });
    }

    pub fn patient(&self, patient: Patient) {
        self.store.insert_patient(patient);
    }

    pub fn appointment(
        &self,
        tenant_id: &str,
        id: i64,
        patient_id: i64,
        start_at: i64,
        status: AppointmentStatus,
        created_at: i64,
    ) {
        self.store.insert_appointment(Appointment {
            id,
            tenant_id: tenant_id.to_string(),
            patient_id,
            start_at,
            status,
            created_at,
        });
    }
}

/// Active patient with no optional attributes set
pub fn patient(tenant_id: &str, id: i64, first: &str, last: &str) -> Patient {
    Patient {
        id,
        tenant_id: tenant_id.to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: None,
        phone: None,
        birth_date: None,
        gender: None,
        tags: vec![],
        source: None,
        accepts_whatsapp: false,
        accepts_email: false,
        is_active: true,
        created_at: NOW - 50 * DAY_MS,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
