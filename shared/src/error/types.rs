//! Business error type and the JSON response envelope

use super::category::ErrorCategory;
use super::codes::ErrorCode;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Business-rule failure: a code, a message and optional structured context
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    /// Context such as the offending field or the limit that was hit
    pub details: Option<HashMap<String, Value>>,
}

impl AppError {
    /// Error carrying the code's default message
    pub fn new(code: ErrorCode) -> Self {
        Self::with_message(code, code.message())
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ValidationFailed, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InternalError, msg)
    }

    pub fn already_exists(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        Self::with_message(ErrorCode::AlreadyExists, format!("{resource} already exists"))
            .with_detail("resource", resource)
    }
}

/// JSON envelope for every HTTP response
///
/// `code` is 0 on success; `data` is set on success and `details` on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Value>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: Some(ErrorCode::Success.code()),
            message: ErrorCode::Success.message().to_string(),
            data: Some(data),
            details: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(err: &AppError) -> Self {
        Self {
            code: Some(err.code.code()),
            message: err.message.clone(),
            data: None,
            details: err.details.clone(),
        }
    }
}

// ===== Axum Integration =====

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        if self.code.category() == ErrorCategory::System {
            tracing::error!(code = %self.code, message = %self.message, "System error occurred");
        }
        (self.http_status(), axum::Json(ApiResponse::<()>::error(&self))).into_response()
    }
}

impl<T: Serialize> axum::response::IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        let status = match self.code.map(ErrorCode::try_from) {
            None => StatusCode::OK,
            Some(Ok(code)) => code.http_status(),
            Some(Err(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, axum::Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_app_error_new_uses_default_message() {
        let err = AppError::new(ErrorCode::SegmentNotFound);
        assert_eq!(err.code, ErrorCode::SegmentNotFound);
        assert_eq!(err.message, "Segment not found");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_app_error_with_detail() {
        let err = AppError::validation("Expiration date precedes issue date")
            .with_detail("field", "expiration_date")
            .with_detail("issue_date", 100);

        assert_eq!(err.code, ErrorCode::ValidationFailed);
        let details = err.details.unwrap();
        assert_eq!(details["field"], "expiration_date");
        assert_eq!(details["issue_date"], 100);
    }

    #[test]
    fn test_already_exists() {
        let err = AppError::already_exists("Subscription");
        assert_eq!(err.code, ErrorCode::AlreadyExists);
        assert_eq!(err.message, "Subscription already exists");
        assert_eq!(err.http_status(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Subscription already exists");
    }

    #[test]
    fn test_error_envelope() {
        let err = AppError::new(ErrorCode::UsageLimitReached).with_detail("limit", 3);
        let response = ApiResponse::<()>::error(&err);
        assert_eq!(response.code, Some(3014));
        assert_eq!(response.message, "Plan usage limit reached");
        assert!(response.data.is_none());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["details"]["limit"], 3);
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_success_envelope() {
        let json = serde_json::to_string(&ApiResponse::success("processed")).unwrap();
        assert_eq!(json, r#"{"code":0,"message":"OK","data":"processed"}"#);
    }

    #[test]
    fn test_into_response_status() {
        let res = AppError::new(ErrorCode::SubscriptionInactive).into_response();
        assert_eq!(res.status(), StatusCode::PAYMENT_REQUIRED);

        let res = ApiResponse::success(1).into_response();
        assert_eq!(res.status(), StatusCode::OK);

        let res = ApiResponse::<()> {
            code: Some(1234),
            message: "?".into(),
            data: None,
            details: None,
        }
        .into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
