//! HTTP error mapping for JSON endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::{DatabaseError, DispatchError, ScriptError};

/// Failure of a JSON endpoint. Renders as `{"success": false, "error": ..}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Provider(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }
        (
            status,
            Json(serde_json::json!({
                "success": false,
                "error": self.to_string(),
            })),
        )
            .into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::NotConfigured => Self::Unavailable(e.to_string()),
            other => Self::Provider(other.to_string()),
        }
    }
}

impl From<ScriptError> for ApiError {
    fn from(e: ScriptError) -> Self {
        match e {
            ScriptError::Validation(msg) => Self::Validation(msg),
            ScriptError::Conflict { .. } => Self::Conflict(e.to_string()),
            ScriptError::NotFound { .. } => Self::NotFound(e.to_string()),
            ScriptError::Synthesis(_) => Self::Provider(e.to_string()),
            ScriptError::Persistence(_) | ScriptError::Io { .. } => Self::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_errors_map_to_statuses() {
        let conflict: ApiError = ScriptError::Conflict {
            name: "promo".into(),
        }
        .into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let missing: ApiError = ScriptError::NotFound {
            name: "promo".into(),
        }
        .into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let invalid: ApiError = ScriptError::Validation("bad".into()).into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn dispatch_errors_map_to_statuses() {
        let rejected: ApiError = DispatchError::Rejected {
            provider: "twilio".into(),
            status: 400,
            message: "bad number".into(),
        }
        .into();
        assert_eq!(rejected.status(), StatusCode::BAD_GATEWAY);

        let off: ApiError = DispatchError::NotConfigured.into();
        assert_eq!(off.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
