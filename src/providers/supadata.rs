//! Supadata transcript adapter.
//!
//! Small transcripts come back inline; large or caption-less videos make the
//! provider answer 202 with a job id that is polled until it resolves.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::TranscriptError;
use crate::job::TranscriptMode;

use super::{
    TranscriptOutcome, TranscriptPayload, TranscriptPoll, TranscriptProvider, endpoint, http_client,
};

pub struct SupadataProvider {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptResponse {
    content: Option<String>,
    lang: Option<String>,
    #[serde(default)]
    available_langs: Vec<String>,
    job_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatusResponse {
    status: String,
    content: Option<String>,
    lang: Option<String>,
    #[serde(default)]
    available_langs: Vec<String>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl SupadataProvider {
    pub fn new(base_url: String, api_key: SecretString) -> Self {
        Self {
            client: http_client(Duration::from_secs(30)),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl TranscriptProvider for SupadataProvider {
    async fn request_transcript(
        &self,
        url: &str,
        lang: Option<&str>,
        mode: TranscriptMode,
    ) -> Result<TranscriptOutcome, TranscriptError> {
        let mut request = self
            .client
            .get(endpoint(&self.base_url, &["youtube", "transcript"]))
            .header("x-api-key", self.api_key.expose_secret())
            .query(&[("url", url), ("text", "true"), ("mode", mode.as_str())]);
        if let Some(lang) = lang {
            request = request.query(&[("lang", lang)]);
        }

        tracing::debug!(mode = mode.as_str(), "Requesting transcript");

        let response = request.send().await.map_err(|e| TranscriptError::Upstream {
            reason: e.to_string(),
        })?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::ACCEPTED {
            let parsed: TranscriptResponse =
                serde_json::from_str(&body).map_err(|e| TranscriptError::Upstream {
                    reason: format!("malformed async job response: {e}"),
                })?;
            let remote_handle = parsed.job_id.ok_or_else(|| TranscriptError::Upstream {
                reason: "async response missing job id".to_string(),
            })?;
            return Ok(TranscriptOutcome::Async { remote_handle });
        }

        if !status.is_success() {
            return Err(classify_failure(status, &body));
        }

        let parsed: TranscriptResponse =
            serde_json::from_str(&body).map_err(|e| TranscriptError::Upstream {
                reason: format!("malformed transcript response: {e}"),
            })?;

        match parsed.content {
            Some(content) if !content.trim().is_empty() => {
                Ok(TranscriptOutcome::Ready(TranscriptPayload {
                    content,
                    lang: parsed.lang,
                    available_langs: parsed.available_langs,
                }))
            }
            _ => Err(TranscriptError::Unavailable {
                reason: "provider returned an empty transcript".to_string(),
            }),
        }
    }

    async fn poll_transcript_job(
        &self,
        handle: &str,
    ) -> Result<TranscriptPoll, TranscriptError> {
        let response = self
            .client
            .get(endpoint(&self.base_url, &["transcript", handle]))
            .header("x-api-key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| TranscriptError::Upstream {
                reason: e.to_string(),
            })?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(classify_failure(status, &body));
        }

        let parsed: JobStatusResponse =
            serde_json::from_str(&body).map_err(|e| TranscriptError::Upstream {
                reason: format!("malformed job status response: {e}"),
            })?;

        match parsed.status.as_str() {
            "queued" => Ok(TranscriptPoll::Queued),
            "active" => Ok(TranscriptPoll::Active),
            "completed" => match parsed.content {
                Some(content) if !content.trim().is_empty() => {
                    Ok(TranscriptPoll::Completed(TranscriptPayload {
                        content,
                        lang: parsed.lang,
                        available_langs: parsed.available_langs,
                    }))
                }
                _ => Ok(TranscriptPoll::Failed(TranscriptError::Unavailable {
                    reason: "transcript job completed without content".to_string(),
                })),
            },
            "failed" => Ok(TranscriptPoll::Failed(classify_job_error(parsed.error))),
            other => Err(TranscriptError::Upstream {
                reason: format!("unknown transcript job status '{other}'"),
            }),
        }
    }
}

/// Map a provider HTTP failure onto the transcript error taxonomy. The body's
/// error code wins over the status line when both are present.
fn classify_failure(status: StatusCode, body: &str) -> TranscriptError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.error.unwrap_or_default();
    let reason = parsed.message.unwrap_or_else(|| format!("HTTP {status}"));

    if code.contains("transcript-unavailable") || status == StatusCode::PARTIAL_CONTENT {
        return TranscriptError::Unavailable { reason };
    }
    if code.contains("video-not-found")
        || code.contains("video-unavailable")
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::NOT_FOUND
    {
        return TranscriptError::VideoUnavailable { reason };
    }
    if status == StatusCode::BAD_REQUEST || code.contains("invalid-request") {
        return TranscriptError::InvalidRequest { reason };
    }
    TranscriptError::Upstream {
        reason: format!("HTTP {status}: {reason}"),
    }
}

fn classify_job_error(error: Option<String>) -> TranscriptError {
    let code = error.unwrap_or_default();
    if code.contains("transcript-unavailable") {
        TranscriptError::Unavailable { reason: code }
    } else if code.contains("video") {
        TranscriptError::VideoUnavailable { reason: code }
    } else if code.is_empty() {
        TranscriptError::Upstream {
            reason: "transcript job failed".to_string(),
        }
    } else {
        TranscriptError::Upstream { reason: code }
    }
}
