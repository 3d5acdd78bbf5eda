//! Error category by code range

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    General,
    Tenant,
    Compliance,
    Billing,
    Marketing,
    Report,
    System,
}

impl ErrorCategory {
    /// Category of a numeric code; unassigned ranges count as system
    pub fn from_code(code: u16) -> Self {
        match code {
            0..1000 => Self::General,
            3000..4000 => Self::Tenant,
            4000..5000 => Self::Compliance,
            5000..6000 => Self::Billing,
            6000..7000 => Self::Marketing,
            7000..8000 => Self::Report,
            _ => Self::System,
        }
    }
}

impl ErrorCode {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_code() {
        assert_eq!(ErrorCategory::from_code(0), ErrorCategory::General);
        assert_eq!(ErrorCategory::from_code(999), ErrorCategory::General);
        assert_eq!(ErrorCategory::from_code(1001), ErrorCategory::System);
        assert_eq!(ErrorCategory::from_code(3011), ErrorCategory::Tenant);
        assert_eq!(ErrorCategory::from_code(4002), ErrorCategory::Compliance);
        assert_eq!(ErrorCategory::from_code(5001), ErrorCategory::Billing);
        assert_eq!(ErrorCategory::from_code(6102), ErrorCategory::Marketing);
        assert_eq!(ErrorCategory::from_code(7001), ErrorCategory::Report);
        assert_eq!(ErrorCategory::from_code(9001), ErrorCategory::System);
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(
            ErrorCode::UsageLimitReached.category(),
            ErrorCategory::Tenant
        );
        assert_eq!(
            ErrorCode::StaffNotFound.category(),
            ErrorCategory::Compliance
        );
        assert_eq!(ErrorCode::InternalError.category(), ErrorCategory::System);
    }

    #[test]
    fn test_category_serialize() {
        let json = serde_json::to_string(&ErrorCategory::Marketing).unwrap();
        assert_eq!(json, "\"marketing\"");
    }
}
