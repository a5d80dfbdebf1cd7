use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use persistence::StoreError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
            ),
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => ApiError::Validation(msg),
            StoreError::NotFound(msg) => ApiError::NotFound(msg),
            StoreError::Transient { kind, message } => {
                tracing::warn!(%kind, %message, "Store unavailable");
                ApiError::ServiceUnavailable("The database is temporarily unavailable".into())
            }
            StoreError::PoolExhausted { waited_ms } => {
                tracing::warn!(waited_ms, "No database connection available");
                ApiError::ServiceUnavailable("The server is busy, please retry".into())
            }
            StoreError::Terminal(msg) => ApiError::Internal(format!("Database error: {}", msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::TransientKind;

    #[test]
    fn test_api_error_not_found() {
        let error = ApiError::NotFound("resource not found".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_api_error_validation() {
        let error = ApiError::Validation("invalid input".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_api_error_internal() {
        let error = ApiError::Internal("database connection failed".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            format!("{}", ApiError::NotFound("test".to_string())),
            "Not found: test"
        );
        assert_eq!(
            format!("{}", ApiError::Validation("test".to_string())),
            "Validation error: test"
        );
        assert_eq!(
            format!("{}", ApiError::ServiceUnavailable("test".to_string())),
            "Service unavailable: test"
        );
    }

    #[test]
    fn test_store_error_status_mapping() {
        let cases = [
            (StoreError::Validation("title".into()), StatusCode::BAD_REQUEST),
            (StoreError::NotFound("row".into()), StatusCode::NOT_FOUND),
            (
                StoreError::transient(TransientKind::Connection, "reset"),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                StoreError::PoolExhausted { waited_ms: 30000 },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                StoreError::terminal("duplicate key"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (store_error, status) in cases {
            let response = ApiError::from(store_error).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[test]
    fn test_terminal_error_keeps_detail_for_logs() {
        let error = ApiError::from(StoreError::terminal("relation does not exist"));
        match error {
            ApiError::Internal(msg) => assert!(msg.contains("relation does not exist")),
            other => panic!("Expected Internal error, got {:?}", other),
        }
    }
}
