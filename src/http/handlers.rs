//! Handlers for the summaries API.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::cache::CacheEntry;
use crate::driver::CancelOutcome;
use crate::error::JobFailure;
use crate::job::{Job, JobInput, JobStatus};
use crate::ratelimit::{MethodClass, RateLimitDecision};
use crate::validate::validate_title;

use super::AppState;
use super::error::{ApiError, apply_rate_limit_headers};
use super::types::{
    CACHED_JOB_ID, CompletedResponse, CreateSummaryRequest, FailedResponse, HealthResponse,
    JobAccepted, ProcessingResponse, SummaryMeta,
};

pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Caller identity for rate limiting: first forwarded hop, else the realest
/// IP header we can find, else a shared bucket.
fn client_identity(headers: &HeaderMap) -> String {
    for name in ["x-forwarded-for", "x-real-ip", "cf-connecting-ip"] {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            if let Some(first) = value.split(',').next().map(str::trim) {
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }
    "unknown".to_string()
}

async fn check_rate(
    state: &AppState,
    class: MethodClass,
    headers: &HeaderMap,
) -> Result<RateLimitDecision, ApiError> {
    let decision = state.limiter().check(class, &client_identity(headers)).await;
    if decision.allowed {
        Ok(decision)
    } else {
        Err(ApiError::rate_limited(decision))
    }
}

fn with_rate_headers(mut response: Response, decision: &RateLimitDecision) -> Response {
    apply_rate_limit_headers(response.headers_mut(), decision);
    response
}

pub(super) async fn create_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateSummaryRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let driver = state.driver()?;
    let decision = check_rate(&state, MethodClass::Post, &headers).await?;

    let Json(request) =
        body.map_err(|e| ApiError::invalid_request(format!("malformed request body: {e}")))?;

    let validated = state.validator().validate(&request.url).map_err(|e| {
        ApiError::invalid_request(e.to_string()).with_details(serde_json::json!({"field": "url"}))
    })?;
    if let Some(title) = request.title.as_deref() {
        validate_title(title).map_err(|e| {
            ApiError::invalid_request(e.to_string())
                .with_details(serde_json::json!({"field": "title"}))
        })?;
    }

    // A hit never materializes a job record, and never overwrites an in-flight
    // job for the same fingerprint.
    if let Some(entry) = state
        .cache()
        .lookup(&validated.canonical_url, &request.options)
        .await?
    {
        tracing::debug!(url = %validated.canonical_url, "Summary cache hit");
        let response = (StatusCode::OK, Json(cached_response(entry))).into_response();
        return Ok(with_rate_headers(response, &decision));
    }

    let input = JobInput {
        url: request.url,
        canonical_url: validated.canonical_url,
        title: request.title,
        lang: request.lang,
        options: request.options,
    };
    let job = driver.create(input).await?;

    let accepted = JobAccepted {
        job_id: job.id,
        status: job.status,
        stage: job.stage,
    };
    let response = (StatusCode::ACCEPTED, Json(accepted)).into_response();
    Ok(with_rate_headers(response, &decision))
}

pub(super) async fn get_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let driver = state.driver()?;
    let decision = check_rate(&state, MethodClass::Get, &headers).await?;

    let Some(job) = driver.poll(&job_id).await? else {
        return Err(ApiError::not_found());
    };

    Ok(with_rate_headers(project_job(job), &decision))
}

pub(super) async fn cancel_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let driver = state.driver()?;
    let decision = check_rate(&state, MethodClass::Get, &headers).await?;

    match driver.cancel(&job_id).await? {
        CancelOutcome::Cancelled => {
            Ok(with_rate_headers(StatusCode::NO_CONTENT.into_response(), &decision))
        }
        CancelOutcome::NotFound => Err(ApiError::not_found()),
    }
}

fn cached_response(entry: CacheEntry) -> CompletedResponse {
    CompletedResponse {
        job_id: CACHED_JOB_ID.to_string(),
        status: JobStatus::Completed,
        result: entry.result,
        meta: SummaryMeta {
            transcript_lang: entry.meta.transcript_lang,
            available_langs: entry.meta.available_langs,
            title: None,
        },
    }
}

/// Map a job snapshot onto its wire projection.
fn project_job(job: Job) -> Response {
    match job.status {
        JobStatus::Completed => match job.result {
            Some(result) => (
                StatusCode::OK,
                Json(CompletedResponse {
                    job_id: job.id,
                    status: JobStatus::Completed,
                    result,
                    meta: SummaryMeta {
                        transcript_lang: job.transcript.transcript_lang,
                        available_langs: job.transcript.available_langs,
                        title: job.input.title,
                    },
                }),
            )
                .into_response(),
            None => ApiError::internal("completed job is missing its result").into_response(),
        },
        JobStatus::Failed => {
            let error = job
                .error
                .unwrap_or_else(|| JobFailure::backend("failed job is missing its error record"));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(FailedResponse {
                    job_id: job.id,
                    status: JobStatus::Failed,
                    error,
                }),
            )
                .into_response()
        }
        JobStatus::Cancelled => ApiError::cancelled().into_response(),
        JobStatus::Processing => (
            StatusCode::ACCEPTED,
            Json(ProcessingResponse {
                job_id: job.id,
                status: job.status,
                stage: job.stage,
                provider_status: job.transcript.provider_status,
            }),
        )
            .into_response(),
    }
}
