//! Subscription, Plan and usage Models

use serde::{Deserialize, Serialize};

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "TRIALING" => Some(Self::Trialing),
            "ACTIVE" => Some(Self::Active),
            "PAST_DUE" => Some(Self::PastDue),
            "CANCELLED" => Some(Self::Cancelled),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Trialing => "TRIALING",
            Self::Active => "ACTIVE",
            Self::PastDue => "PAST_DUE",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        }
    }
}

/// Tenant subscription (one per tenant)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub tenant_id: String,
    pub plan_id: String,
    pub status: SubscriptionStatus,
    pub trial_ends_at: Option<i64>,
    pub current_period_end: Option<i64>,
    pub provider_customer_id: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Plan with per-metric ceilings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Stable slug: `basic`, `professional`, `enterprise`
    pub id: String,
    pub name: String,
    pub max_users: i64,
    pub max_patients: i64,
    pub max_appointments_per_month: i64,
    /// Storage ceiling in gigabytes
    pub max_storage_gb: i64,
    pub price_monthly_cents: i64,
    /// Price id at the billing provider, used for checkout
    pub provider_price_id: Option<String>,
}

impl Plan {
    /// Ceiling for a metric, in the unit `check_usage_limit` counts in
    /// (storage in megabytes).
    pub fn limit_for(&self, metric: UsageMetric) -> i64 {
        match metric {
            UsageMetric::Users => self.max_users,
            UsageMetric::Patients => self.max_patients,
            UsageMetric::Appointments => self.max_appointments_per_month,
            UsageMetric::Storage => self.max_storage_gb * 1024,
        }
    }
}

/// Countable resource limited by a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageMetric {
    Users,
    Patients,
    /// Appointments created in the current calendar month
    Appointments,
    /// Document storage in megabytes
    Storage,
}

impl UsageMetric {
    pub const ALL: [UsageMetric; 4] = [
        Self::Users,
        Self::Patients,
        Self::Appointments,
        Self::Storage,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Patients => "patients",
            Self::Appointments => "appointments",
            Self::Storage => "storage",
        }
    }
}

/// Result of a usage limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCheck {
    pub metric: UsageMetric,
    pub allowed: bool,
    pub current: i64,
    pub limit: i64,
}

/// All metrics for a tenant at once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSummary {
    pub plan_id: String,
    pub metrics: Vec<UsageCheck>,
}
