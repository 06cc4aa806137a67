use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Errors the request pipeline turns into HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not allowed by CORS: origin {origin:?}")]
    OriginNotAllowed { origin: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimit { message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::OriginNotAllowed { .. } => StatusCode::FORBIDDEN,
            AppError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        }
    }

    /// Get the error type for logging
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::OriginNotAllowed { .. } => "origin_not_allowed",
            AppError::RateLimit { .. } => "rate_limit",
            AppError::NotFound { .. } => "not_found",
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                id: Uuid::new_v4().to_string(),
                error_type: self.error_type().to_string(),
                message: self.to_string(),
                details: self.get_details(),
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
        }
    }

    fn get_details(&self) -> Option<Value> {
        match self {
            AppError::OriginNotAllowed { origin } => Some(json!({ "origin": origin })),
            AppError::NotFound { resource } => Some(json!({ "resource": resource })),
            _ => None,
        }
    }
}

/// Structured error response
#[derive(serde::Serialize, Debug)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(serde::Serialize, Debug)]
pub struct ErrorDetail {
    pub id: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub timestamp: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = self.to_error_response();

        warn!(
            error_type = self.error_type(),
            error_id = error_response.error.id,
            status = status.as_u16(),
            "Request rejected: {}",
            self
        );

        (status, Json(error_response)).into_response()
    }
}
