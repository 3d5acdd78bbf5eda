//! HTTP status for each error code

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            Self::TenantNotFound
            | Self::PlanNotFound
            | Self::StaffNotFound
            | Self::SegmentNotFound => StatusCode::NOT_FOUND,

            Self::AlreadyExists
            | Self::SegmentInUse
            | Self::InvalidCampaignTransition
            | Self::CampaignNotEditable => StatusCode::CONFLICT,

            Self::SubscriptionInactive | Self::UsageLimitReached => StatusCode::PAYMENT_REQUIRED,

            // Upstream billing provider
            Self::PaymentSetupFailed => StatusCode::BAD_GATEWAY,

            Self::InternalError | Self::ExportFailed => StatusCode::INTERNAL_SERVER_ERROR,

            Self::ValidationFailed
            | Self::TenantNoSubscription
            | Self::WebhookSignatureInvalid
            | Self::WebhookPayloadInvalid
            | Self::SegmentInactive
            | Self::ScheduleInPast
            | Self::InvalidDateRange => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_status() {
        assert_eq!(ErrorCode::StaffNotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::SegmentNotFound.http_status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_conflict_status() {
        assert_eq!(ErrorCode::SegmentInUse.http_status(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::InvalidCampaignTransition.http_status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_payment_required_status() {
        assert_eq!(
            ErrorCode::UsageLimitReached.http_status(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            ErrorCode::SubscriptionInactive.http_status(),
            StatusCode::PAYMENT_REQUIRED
        );
    }

    #[test]
    fn test_bad_request_status() {
        assert_eq!(
            ErrorCode::WebhookSignatureInvalid.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::TenantNoSubscription.http_status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_server_side_status() {
        assert_eq!(
            ErrorCode::InternalError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::PaymentSetupFailed.http_status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
