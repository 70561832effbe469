// SPDX-License-Identifier: GPL-3.0-or-later
//! The `{status, data?, message?, error?}` response shape every handler in
//! this crate returns (§4.7), implemented once as a generic wrapper instead
//! of ad hoc JSON per handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ApiErrorBody {
    pub code: u16,
    #[serde(rename = "type")]
    pub error_type: &'static str,
    pub message: String,
    pub id: String,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ApiEnvelope<T: Serialize> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
}

impl<T: Serialize> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self { status: "success", data: Some(data), message: None, error: None }
    }
}

/// Error taxonomy surfaced via the envelope (§7): one variant per entry in
/// the spec's table, each carrying enough context to render the envelope. A
/// single `IntoResponse` impl below performs the status-code mapping,
/// keeping `StatusCode` out of the handlers themselves.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Authentication(String),
    Authorization(String),
    NotFound(String),
    Timeout(String),
    Conflict(String),
    RateLimit(String),
    ExternalService(String),
    Server(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, "ValidationError", message),
            ApiError::Authentication(message) => (StatusCode::UNAUTHORIZED, "AuthenticationError", message),
            ApiError::Authorization(message) => (StatusCode::FORBIDDEN, "AuthorizationError", message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "ResourceNotFound", message),
            ApiError::Timeout(message) => (StatusCode::REQUEST_TIMEOUT, "TimeoutError", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "ConflictError", message),
            ApiError::RateLimit(message) => (StatusCode::TOO_MANY_REQUESTS, "RateLimitError", message),
            ApiError::ExternalService(message) => (StatusCode::BAD_GATEWAY, "ExternalServiceError", message),
            ApiError::Server(message) => (StatusCode::INTERNAL_SERVER_ERROR, "ServerError", message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.parts();
        let body: ApiEnvelope<()> = ApiEnvelope {
            status: "error",
            data: None,
            message: None,
            error: Some(ApiErrorBody {
                code: status.as_u16(),
                error_type,
                message: message.to_string(),
                id: Uuid::new_v4().to_string(),
                request_id: Uuid::new_v4().to_string(),
                timestamp: Utc::now(),
                details: None,
            }),
        };
        (status, Json(body)).into_response()
    }
}

impl<T: Serialize> IntoResponse for ApiEnvelope<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_taxonomy_entry_maps_to_its_spec_status_code() {
        let cases = [
            (ApiError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Authentication("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::Authorization("x".into()), StatusCode::FORBIDDEN),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::Timeout("x".into()), StatusCode::REQUEST_TIMEOUT),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT),
            (ApiError::RateLimit("x".into()), StatusCode::TOO_MANY_REQUESTS),
            (ApiError::ExternalService("x".into()), StatusCode::BAD_GATEWAY),
            (ApiError::Server("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(error.parts().0, expected);
        }
    }
}
