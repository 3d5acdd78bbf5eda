//! Clinic staff user Model

use serde::{Deserialize, Serialize};

/// Staff member with a login on the tenant's account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffUser {
    pub id: i64,
    pub tenant_id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    /// Deactivated users do not count toward the plan's user limit
    pub is_active: bool,
    pub created_at: i64,
}
