//! Unified service-layer error type for clinic-cloud
//!
//! `ServiceError` bridges store/provider errors (`sqlx::Error`, `BoxError`)
//! and the API-layer error (`AppError`), so services can use `?` everywhere.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};

use crate::BoxError;

/// Service-layer error, two variants only.
///
/// - `Db`: store or billing-provider failure (logged, mapped to InternalError)
/// - `App`: business-rule failure (passed through to the client)
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Store or external dependency error (sqlx, reqwest, serde, ...)
    #[error("store error: {0}")]
    Db(BoxError),
    /// Business-rule error (already an AppError with the correct ErrorCode)
    #[error("{} ({})", .0.message, .0.code)]
    App(AppError),
}

impl ServiceError {
    /// Error code for business-rule errors, `None` for infrastructure errors
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ServiceError::App(e) => Some(e.code),
            ServiceError::Db(_) => None,
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        ServiceError::Db(e.into())
    }
}

impl From<BoxError> for ServiceError {
    fn from(e: BoxError) -> Self {
        ServiceError::Db(e)
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Db(db_err) => {
                tracing::error!(error = %db_err, "Service store error");
                AppError::new(ErrorCode::InternalError)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

/// Convenience type alias for service-layer results
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_error_maps_to_internal() {
        let err: ServiceError = BoxError::from("connection reset").into();
        assert!(err.code().is_none());
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::InternalError);
    }

    #[test]
    fn test_app_error_passes_through() {
        let err: ServiceError = AppError::new(ErrorCode::SegmentInUse).into();
        assert_eq!(err.code(), Some(ErrorCode::SegmentInUse));
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::SegmentInUse);
    }
}
