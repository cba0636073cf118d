use crate::core::IncidentError;
use crate::dispatcher::DispatchError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

/// The body of every error response.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub detail: String,
}

/// An error that maps onto an HTTP status.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            ApiError::BadRequest(detail)
            | ApiError::NotFound(detail)
            | ApiError::Internal(detail) => detail,
        };
        (status, Json(ErrorResponse { detail })).into_response()
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(e) => ApiError::BadRequest(e.to_string()),
            DispatchError::AllChannelsExhausted { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<IncidentError> for ApiError {
    fn from(err: IncidentError) -> Self {
        match err {
            IncidentError::NotFound(_) => ApiError::NotFound(err.to_string()),
            IncidentError::InvalidInput(_) => ApiError::BadRequest(err.to_string()),
            IncidentError::Storage(_) => {
                error!(error = %err, "Incident storage failure");
                ApiError::Internal("incident storage is unavailable".to_string())
            }
        }
    }
}
