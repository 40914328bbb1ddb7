//! Error taxonomy shared across the service.
//!
//! Every failure surfaced to a client carries one of the [`ErrorCode`]
//! values; provider and processing failures are additionally tagged with the
//! subsystem that produced them so the job record can say whose fault it was.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sanitize::scrub_message;

/// Machine-readable error codes surfaced in API envelopes and job records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    JobNotFound,
    JobCancelled,
    ConfigurationError,
    RateLimitExceeded,
    VideoUnavailable,
    TranscriptUnavailable,
    SupadataInvalidRequest,
    SupadataUpstreamError,
    GeminiAuth,
    GeminiQuota,
    GeminiUpstreamError,
    GeminiInvalidResponse,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::JobNotFound => "JOB_NOT_FOUND",
            Self::JobCancelled => "JOB_CANCELLED",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::VideoUnavailable => "VIDEO_UNAVAILABLE",
            Self::TranscriptUnavailable => "TRANSCRIPT_UNAVAILABLE",
            Self::SupadataInvalidRequest => "SUPADATA_INVALID_REQUEST",
            Self::SupadataUpstreamError => "SUPADATA_UPSTREAM_ERROR",
            Self::GeminiAuth => "GEMINI_AUTH",
            Self::GeminiQuota => "GEMINI_QUOTA",
            Self::GeminiUpstreamError => "GEMINI_UPSTREAM_ERROR",
            Self::GeminiInvalidResponse => "GEMINI_INVALID_RESPONSE",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which subsystem a job-scoped failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    Transcript,
    Summarizer,
    Backend,
}

/// Transcript provider failures, classified into the wire taxonomy.
#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("transcript provider rejected the request: {reason}")]
    InvalidRequest { reason: String },
    #[error("video is unavailable: {reason}")]
    VideoUnavailable { reason: String },
    #[error("no usable transcript: {reason}")]
    Unavailable { reason: String },
    #[error("transcript provider request failed: {reason}")]
    Upstream { reason: String },
}

impl TranscriptError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidRequest { .. } => ErrorCode::SupadataInvalidRequest,
            Self::VideoUnavailable { .. } => ErrorCode::VideoUnavailable,
            Self::Unavailable { .. } => ErrorCode::TranscriptUnavailable,
            Self::Upstream { .. } => ErrorCode::SupadataUpstreamError,
        }
    }
}

/// Summarizer failures, classified into the wire taxonomy.
#[derive(Debug, Error)]
pub enum SummarizerError {
    #[error("summarizer authentication failed")]
    Auth,
    #[error("summarizer quota exhausted")]
    Quota,
    #[error("summarizer returned malformed output: {reason}")]
    InvalidResponse { reason: String },
    #[error("summarizer request failed: {reason}")]
    Upstream { reason: String },
}

impl SummarizerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Auth => ErrorCode::GeminiAuth,
            Self::Quota => ErrorCode::GeminiQuota,
            Self::InvalidResponse { .. } => ErrorCode::GeminiInvalidResponse,
            Self::Upstream { .. } => ErrorCode::GeminiUpstreamError,
        }
    }
}

/// KV store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("kv request failed: {reason}")]
    Request { reason: String },
    #[error("kv backend error: {reason}")]
    Backend { reason: String },
    #[error("kv payload could not be decoded: {reason}")]
    Decode { reason: String },
}

/// Configuration problems: unparsable values are fatal at startup, missing
/// credentials surface per request as `CONFIGURATION_ERROR`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {key}")]
    Missing { key: &'static str },
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// The failure record embedded in a failed job. Messages are scrubbed before
/// they are stored so they can be returned to clients verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub code: ErrorCode,
    pub message: String,
    pub provider: ProviderTag,
}

impl JobFailure {
    pub fn from_transcript(error: &TranscriptError) -> Self {
        Self {
            code: error.code(),
            message: scrub_message(&error.to_string()),
            provider: ProviderTag::Transcript,
        }
    }

    pub fn from_summarizer(error: &SummarizerError) -> Self {
        Self {
            code: error.code(),
            message: scrub_message(&error.to_string()),
            provider: ProviderTag::Summarizer,
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InternalError,
            message: scrub_message(&message.into()),
            provider: ProviderTag::Backend,
        }
    }
}
