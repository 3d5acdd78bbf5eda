//! Patient Model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Patient record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub tenant_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Acquisition channel ("instagram", "referral", ...)
    pub source: Option<String>,
    pub accepts_whatsapp: bool,
    pub accepts_email: bool,
    pub is_active: bool,
    pub created_at: i64,
}

/// Patient projection returned by segment previews
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientSummary {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl From<&Patient> for PatientSummary {
    fn from(p: &Patient) -> Self {
        Self {
            id: p.id,
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            email: p.email.clone(),
            phone: p.phone.clone(),
        }
    }
}
