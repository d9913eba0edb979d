//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::repository::RepositoryError;
use crate::service::BuildLogError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    GatewayTimeout(String),
    RepositoryError(RepositoryError),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            ApiError::RepositoryError(err) => {
                tracing::error!("Repository error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<BuildLogError> for ApiError {
    fn from(err: BuildLogError) -> Self {
        let message = err.to_string();
        match err {
            BuildLogError::Validation(_)
            | BuildLogError::NoLogsAvailable { .. }
            | BuildLogError::Resolution { .. }
            | BuildLogError::UnsupportedStrategy(_) => ApiError::BadRequest(message),
            BuildLogError::BuildNotFound(_) | BuildLogError::BuildDeleted(_) => {
                ApiError::NotFound(message)
            }
            BuildLogError::Timeout { .. } => ApiError::GatewayTimeout(message),
            BuildLogError::UnknownBuildPhase(_) => ApiError::InternalError(message),
            BuildLogError::Repository(err) => ApiError::RepositoryError(err),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use buildlog_core::domain::build::BuildPhase;
    use std::time::Duration;

    fn status_of(err: BuildLogError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_build_log_error_status_mapping() {
        assert_eq!(
            status_of(BuildLogError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(BuildLogError::NoLogsAvailable {
                name: "ci/app-1".into(),
                phase: BuildPhase::Cancelled,
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(BuildLogError::Resolution {
                build: "ci/app-1".into(),
                reason: "no unit".into(),
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(BuildLogError::UnsupportedStrategy("ci/p-1".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(BuildLogError::BuildNotFound("ci/app-1".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(BuildLogError::BuildDeleted("ci/app-1".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(BuildLogError::Timeout {
                name: "ci/app-1".into(),
                waited: Duration::from_secs(10),
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(BuildLogError::UnknownBuildPhase("ci/app-1".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(BuildLogError::Repository(RepositoryError::Transport(
                "down".into()
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
