//! Error codes returned by the clinic platform
//!
//! Codes are grouped by the thousand:
//! - 0xxx: General
//! - 3xxx: Tenant & subscription
//! - 4xxx: Compliance documents
//! - 5xxx: Billing provider
//! - 6xxx: Marketing (segments, campaigns)
//! - 7xxx: Reports
//! - 9xxx: System

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code, serialized as its numeric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Envelope code of a successful response
    Success = 0,
    /// Input failed a business validation rule
    ValidationFailed = 2,
    /// Record with the same identity already exists
    AlreadyExists = 4,

    // ==================== 3xxx: Tenant ====================
    TenantNotFound = 3002,
    TenantNoSubscription = 3011,
    /// Subscription is neither ACTIVE nor a running trial
    SubscriptionInactive = 3012,
    /// Plan ceiling for a usage metric reached
    UsageLimitReached = 3014,
    PlanNotFound = 3015,
    /// Billing provider refused a customer, checkout or portal request
    PaymentSetupFailed = 3017,

    // ==================== 4xxx: Compliance ====================
    /// Referenced staff member does not belong to the tenant
    StaffNotFound = 4002,

    // ==================== 5xxx: Billing ====================
    WebhookSignatureInvalid = 5001,
    WebhookPayloadInvalid = 5002,

    // ==================== 6xxx: Marketing ====================
    SegmentNotFound = 6001,
    /// Segment is referenced by an open campaign
    SegmentInUse = 6002,
    SegmentInactive = 6003,
    InvalidCampaignTransition = 6102,
    /// Campaign left DRAFT
    CampaignNotEditable = 6103,
    ScheduleInPast = 6104,

    // ==================== 7xxx: Report ====================
    InvalidDateRange = 7001,
    ExportFailed = 7002,

    // ==================== 9xxx: System ====================
    InternalError = 9001,
}

impl ErrorCode {
    /// Numeric value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Message used when an error carries no custom one
    pub const fn message(&self) -> &'static str {
        match self {
            ErrorCode::Success => "OK",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::AlreadyExists => "Resource already exists",

            ErrorCode::TenantNotFound => "Tenant not found",
            ErrorCode::TenantNoSubscription => "No subscription found for tenant",
            ErrorCode::SubscriptionInactive => "Subscription is not active",
            ErrorCode::UsageLimitReached => "Plan usage limit reached",
            ErrorCode::PlanNotFound => "Plan not found",
            ErrorCode::PaymentSetupFailed => "Payment setup failed",

            ErrorCode::StaffNotFound => "Staff member not found",

            ErrorCode::WebhookSignatureInvalid => "Webhook signature is invalid",
            ErrorCode::WebhookPayloadInvalid => "Webhook payload is invalid",

            ErrorCode::SegmentNotFound => "Segment not found",
            ErrorCode::SegmentInUse => "Segment is used by an active campaign",
            ErrorCode::SegmentInactive => "Segment is inactive",
            ErrorCode::InvalidCampaignTransition => "Campaign status transition not allowed",
            ErrorCode::CampaignNotEditable => "Campaign can only be edited while in draft",
            ErrorCode::ScheduleInPast => "Scheduled time must be in the future",

            ErrorCode::InvalidDateRange => "Start of range must not be after its end",
            ErrorCode::ExportFailed => "Report export failed",

            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Numeric value that names no `ErrorCode`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            0 => ErrorCode::Success,
            2 => ErrorCode::ValidationFailed,
            4 => ErrorCode::AlreadyExists,

            3002 => ErrorCode::TenantNotFound,
            3011 => ErrorCode::TenantNoSubscription,
            3012 => ErrorCode::SubscriptionInactive,
            3014 => ErrorCode::UsageLimitReached,
            3015 => ErrorCode::PlanNotFound,
            3017 => ErrorCode::PaymentSetupFailed,

            4002 => ErrorCode::StaffNotFound,

            5001 => ErrorCode::WebhookSignatureInvalid,
            5002 => ErrorCode::WebhookPayloadInvalid,

            6001 => ErrorCode::SegmentNotFound,
            6002 => ErrorCode::SegmentInUse,
            6003 => ErrorCode::SegmentInactive,
            6102 => ErrorCode::InvalidCampaignTransition,
            6103 => ErrorCode::CampaignNotEditable,
            6104 => ErrorCode::ScheduleInPast,

            7001 => ErrorCode::InvalidDateRange,
            7002 => ErrorCode::ExportFailed,

            9001 => ErrorCode::InternalError,

            _ => return Err(InvalidErrorCode(value)),
        };
        Ok(code)
    }
}
