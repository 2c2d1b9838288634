//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use kadernim_domain::error::{KadernimError, ValidationError, describe};

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`KadernimError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(KadernimError);

impl From<KadernimError> for ApiError {
    fn from(err: KadernimError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            KadernimError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            KadernimError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            KadernimError::Transition(err) => (StatusCode::CONFLICT, err.to_string()),
            KadernimError::Storage(_) | KadernimError::Delivery(_) => {
                tracing::error!(error = %describe(&self.0), "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
