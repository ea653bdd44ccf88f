use api_shared::ErrorRes;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use habit_core::CoreError;

/// Error returned by every handler.
///
/// Core errors are mapped to a status code and a stable `kind` string; extractor rejections are
/// always `400 Bad Request`.
#[derive(Debug)]
pub enum ApiError {
    Core(CoreError),
    BadRequest(String),
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError::Core(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            ApiError::Core(e) => match e {
                CoreError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
                CoreError::AccessDenied(_) => (StatusCode::FORBIDDEN, "access_denied"),
                CoreError::ModelUnavailable(_) => (StatusCode::BAD_GATEWAY, "model_unavailable"),
                CoreError::LedgerUnavailable(_) => {
                    (StatusCode::BAD_GATEWAY, "ledger_unavailable")
                }
                CoreError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration"),
                CoreError::Serialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();

        let detail = match &self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Core(e) if status.is_server_error() && status != StatusCode::BAD_GATEWAY => {
                tracing::error!("request failed: {}", e);
                "Internal error".to_string()
            }
            ApiError::Core(e) => {
                if status == StatusCode::BAD_GATEWAY {
                    tracing::error!("upstream failure: {}", e);
                } else {
                    tracing::warn!("request rejected: {}", e);
                }
                e.to_string()
            }
        };

        let body = ErrorRes {
            detail,
            kind: kind.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use habit_core::ConfigError;

    fn status_of(e: CoreError) -> StatusCode {
        ApiError::from(e).into_response().status()
    }

    #[test]
    fn test_core_errors_map_to_statuses() {
        assert_eq!(
            status_of(CoreError::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CoreError::AccessDenied("x".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(CoreError::ModelUnavailable("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(CoreError::LedgerUnavailable("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(CoreError::Config(ConfigError::MissingEnvVar("X"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_kinds_are_stable() {
        let (_, kind) = ApiError::from(CoreError::ModelUnavailable("x".into())).status_and_kind();
        assert_eq!(kind, "model_unavailable");
        let (_, kind) = ApiError::BadRequest("missing field".into()).status_and_kind();
        assert_eq!(kind, "invalid_input");
    }
}
