//! Tenant Report Model

use serde::{Deserialize, Serialize};

use super::StatusCount;

/// Aggregated tenant activity over `[from, to)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantReport {
    pub tenant_id: String,
    pub from: i64,
    pub to: i64,
    pub appointments_by_status: Vec<StatusCount>,
    pub total_appointments: i64,
    pub new_patients: i64,
    /// Current snapshot, not range-bound
    pub documents_by_status: Vec<StatusCount>,
    pub campaigns_by_status: Vec<StatusCount>,
    pub generated_at: i64,
}
