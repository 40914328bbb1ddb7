//! API error envelope and status mapping.

use axum::Json;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::error::{ErrorCode, StoreError};
use crate::ratelimit::RateLimitDecision;
use crate::sanitize::scrub_message;

use super::types::{ErrorBody, ErrorEnvelope};

/// An HTTP-immediate error: status code, wire code, scrubbed message, and,
/// for 429s, the limiter decision that produced it.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: ErrorCode,
    message: String,
    details: Option<Value>,
    rate: Option<RateLimitDecision>,
}

impl ApiError {
    fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: scrub_message(&message.into()),
            details: None,
            rate: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::InvalidRequest, message)
    }

    pub fn not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            ErrorCode::JobNotFound,
            "no such job, or it has expired",
        )
    }

    pub fn cancelled() -> Self {
        Self::new(StatusCode::GONE, ErrorCode::JobCancelled, "job was cancelled")
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::ConfigurationError,
            message,
        )
    }

    pub fn rate_limited(decision: RateLimitDecision) -> Self {
        let mut error = Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::RateLimitExceeded,
            "rate limit exceeded, retry later",
        );
        error.rate = Some(decision);
        error
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalError,
            message,
        )
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "Store operation failed");
        Self::internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorEnvelope {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        });
        let mut response = (self.status, body).into_response();
        if let Some(decision) = self.rate {
            apply_rate_limit_headers(response.headers_mut(), &decision);
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(decision.retry_after_secs()),
            );
        }
        response
    }
}

/// The `X-RateLimit-*` trio carried by every response on a limited path.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(decision.reset_at_ms));
}
