//! Data models
//!
//! Shared between the cloud services and API consumers.
//! Tenants use UUID string IDs; business entities use snowflake `i64` IDs.
//! Timestamps are Unix milliseconds (`i64`).

pub mod appointment;
pub mod campaign;
pub mod compliance_document;
pub mod patient;
pub mod report;
pub mod segment;
pub mod subscription;
pub mod tenant;
pub mod user;

// Re-exports
pub use appointment::*;
pub use campaign::*;
pub use compliance_document::*;
pub use patient::*;
pub use report::*;
pub use segment::*;
pub use subscription::*;
pub use tenant::*;
pub use user::*;

use serde::{Deserialize, Serialize};

/// Group-by-count row (status → number of rows)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}
