//! Tenant Model

use serde::{Deserialize, Serialize};

/// Tenant account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantStatus {
    /// Clinic can use the platform
    Active,
    /// Blocked by the back office (payment failure, abuse)
    Suspended,
    /// Account closed
    Cancelled,
}

impl TenantStatus {
    /// Parse from database string value
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(Self::Active),
            "SUSPENDED" => Some(Self::Suspended),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Database string representation
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

/// Tenant entity (one clinic account, the isolation boundary)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub email: String,
    pub status: TenantStatus,
    /// Customer id at the billing provider, set on first checkout
    pub billing_customer_id: Option<String>,
    pub created_at: i64,
}
