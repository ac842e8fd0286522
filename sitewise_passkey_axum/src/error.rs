use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use serde_json::json;

use sitewise_passkey::PasskeyError;

/// An error body `{"success": false, "error": ...}` with its status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub message: String,
    pub retry_after_secs: Option<u64>,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after_secs: None,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let body = Json(json!({"success": false, "error": self.message}));
        let mut response = (self.status, body).into_response();
        if let Some(secs) = self.retry_after_secs {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<PasskeyError> for ErrorResponse {
    fn from(e: PasskeyError) -> Self {
        let status = match e {
            PasskeyError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            PasskeyError::InvalidOrExpiredChallenge
            | PasskeyError::UnknownCredential
            | PasskeyError::VerificationFailed
            | PasskeyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PasskeyError::DuplicateCredential => StatusCode::CONFLICT,
            PasskeyError::Unauthorized => StatusCode::FORBIDDEN,
            PasskeyError::NotFound(_) => StatusCode::NOT_FOUND,
            PasskeyError::Storage(_) | PasskeyError::Config(_) | PasskeyError::Utils(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Internal details stay in the log.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Passkey request failed: {}", e);
            "Internal server error".to_string()
        } else {
            e.to_string()
        };

        let retry_after_secs = match e {
            PasskeyError::RateLimited { retry_after_secs } => Some(retry_after_secs),
            _ => None,
        };

        Self {
            status,
            message,
            retry_after_secs,
        }
    }
}

/// Helper trait for converting core results into handler results
pub(crate) trait IntoResponseError<T> {
    fn into_response_error(self) -> Result<T, ErrorResponse>;
}

impl<T> IntoResponseError<T> for Result<T, PasskeyError> {
    fn into_response_error(self) -> Result<T, ErrorResponse> {
        self.map_err(ErrorResponse::from)
    }
}
