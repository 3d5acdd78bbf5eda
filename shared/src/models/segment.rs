//! Patient Segment Models

use serde::{Deserialize, Serialize};

use super::patient::PatientSummary;

/// Declarative patient filter
///
/// Every present field adds one AND-ed predicate; an all-`None` filter
/// matches every active patient of the tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// Patient must carry at least one of these tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_visit_within_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_visit_in_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepts_whatsapp: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepts_email: Option<bool>,
}

impl SegmentFilters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Saved segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: i64,
    pub tenant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub filters: SegmentFilters,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create segment payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentCreate {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub filters: SegmentFilters,
}

/// Update segment payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub filters: Option<SegmentFilters>,
    pub is_active: Option<bool>,
}

/// Audience count plus a bounded first page
///
/// `patients` is a sample; `count` may exceed its length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentPreview {
    pub count: i64,
    pub patients: Vec<PatientSummary>,
}
