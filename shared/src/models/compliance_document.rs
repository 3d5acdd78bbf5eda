//! Compliance Document Model
//!
//! Licenses, insurance policies, equipment certifications and other
//! documents a clinic must keep current. The file itself lives in an
//! external object store; only its metadata is kept here.

use serde::{Deserialize, Deserializer, Serialize};

/// Derived document lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Valid,
    ExpiringSoon,
    Expired,
    /// Set explicitly when a renewal starts; skipped by bulk recompute
    PendingRenewal,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 4] = [
        Self::Valid,
        Self::ExpiringSoon,
        Self::Expired,
        Self::PendingRenewal,
    ];

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "VALID" => Some(Self::Valid),
            "EXPIRING_SOON" => Some(Self::ExpiringSoon),
            "EXPIRED" => Some(Self::Expired),
            "PENDING_RENEWAL" => Some(Self::PendingRenewal),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::ExpiringSoon => "EXPIRING_SOON",
            Self::Expired => "EXPIRED",
            Self::PendingRenewal => "PENDING_RENEWAL",
        }
    }
}

/// Compliance document entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceDocument {
    pub id: i64,
    pub tenant_id: String,
    /// Staff member the document belongs to (e.g. a dentist's license)
    pub staff_id: Option<i64>,
    pub name: String,
    pub document_type: String,
    pub issue_date: i64,
    /// `None` = never expires
    pub expiration_date: Option<i64>,
    pub status: DocumentStatus,
    pub renewal_started_at: Option<i64>,
    pub file_url: Option<String>,
    /// File size in bytes
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create compliance document payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceDocumentCreate {
    pub staff_id: Option<i64>,
    pub name: String,
    pub document_type: String,
    pub issue_date: i64,
    pub expiration_date: Option<i64>,
    pub file_url: Option<String>,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub notes: Option<String>,
}

/// Update compliance document payload
///
/// Nullable columns are tri-state: field absent leaves the value alone,
/// `null` clears it, a value replaces it. Only a present `expiration_date`
/// triggers a status recompute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplianceDocumentUpdate {
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub staff_id: Option<Option<i64>>,
    pub name: Option<String>,
    pub document_type: Option<String>,
    pub issue_date: Option<i64>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiration_date: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub file_url: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub file_size: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub mime_type: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<Option<String>>,
}

/// List filter for compliance documents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplianceDocumentQuery {
    pub status: Option<DocumentStatus>,
    pub staff_id: Option<i64>,
}

/// Present-but-null becomes `Some(None)`; absence is handled by `default`.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
