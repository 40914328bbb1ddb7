//! Request and response DTOs for the summaries API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorCode, JobFailure};
use crate::job::{JobStage, JobStatus, LangPref, SummaryOptions, SummaryResult};

/// Sentinel job id returned on a cache hit.
pub const CACHED_JOB_ID: &str = "cached";

#[derive(Debug, Deserialize)]
pub struct CreateSummaryRequest {
    pub url: String,
    pub title: Option<String>,
    #[serde(default)]
    pub lang: LangPref,
    #[serde(default)]
    pub options: SummaryOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub job_id: String,
    pub status: JobStatus,
    pub stage: JobStage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_lang: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available_langs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub result: SummaryResult,
    pub meta: SummaryMeta,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub stage: JobStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub error: JobFailure,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
