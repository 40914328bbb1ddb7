//! Ports for the two external capabilities and their adapter factories.
//!
//! The driver only ever sees these traits; the Supadata and Gemini adapters
//! own the wire details. Tests substitute stubs at the same seam.

mod gemini;
mod supadata;

pub use gemini::GeminiSummarizer;
pub use supadata::SupadataProvider;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{ConfigError, SummarizerError, TranscriptError};
use crate::job::{SummaryFormat, SummaryLength, TranscriptMode};

/// A resolved transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptPayload {
    pub content: String,
    pub lang: Option<String>,
    pub available_langs: Vec<String>,
}

/// What a transcript request produced: the transcript itself, or a handle to
/// a remote job that must be polled.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptOutcome {
    Ready(TranscriptPayload),
    Async { remote_handle: String },
}

/// One observation of a remote transcript job.
#[derive(Debug)]
pub enum TranscriptPoll {
    Queued,
    Active,
    Completed(TranscriptPayload),
    Failed(TranscriptError),
}

#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    /// Fetch a transcript, or start an async transcript job.
    async fn request_transcript(
        &self,
        url: &str,
        lang: Option<&str>,
        mode: TranscriptMode,
    ) -> Result<TranscriptOutcome, TranscriptError>;

    /// Observe a previously started transcript job.
    async fn poll_transcript_job(&self, handle: &str)
    -> Result<TranscriptPoll, TranscriptError>;
}

/// The structured payload a summarizer must produce. The driver re-validates
/// it against the configured windows after every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryDraft {
    pub summary: String,
    #[serde(rename = "keyPoints")]
    pub key_points: Vec<String>,
    pub confidence: u8,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        text: &str,
        length: SummaryLength,
        format: SummaryFormat,
    ) -> Result<SummaryDraft, SummarizerError>;

    /// Model identifier echoed into results.
    fn model_id(&self) -> &str;
}

/// HTTP client for an adapter, with a per-adapter request timeout.
pub(crate) fn http_client(timeout: std::time::Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Join path segments onto a configured base endpoint, tolerating stray
/// slashes on either side.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> String {
    let mut url = String::from(base.trim_end_matches('/'));
    for segment in segments {
        url.push('/');
        url.push_str(segment.trim_matches('/'));
    }
    url
}

/// Build the transcript provider from configuration.
pub fn create_transcript_provider(
    config: &Config,
) -> Result<Arc<dyn TranscriptProvider>, ConfigError> {
    let api_key = config
        .transcript
        .api_key
        .clone()
        .ok_or(ConfigError::Missing {
            key: "SUPADATA_API_KEY",
        })?;

    tracing::info!("Using Supadata transcript provider");
    Ok(Arc::new(SupadataProvider::new(
        config.transcript.base_url.clone(),
        api_key,
    )))
}

/// Build the summarizer from configuration.
pub fn create_summarizer(config: &Config) -> Result<Arc<dyn Summarizer>, ConfigError> {
    let api_key = config
        .summarizer
        .api_key
        .clone()
        .ok_or(ConfigError::Missing {
            key: "GEMINI_API_KEY",
        })?;

    tracing::info!(model = %config.summarizer.model, "Using Gemini summarizer");
    Ok(Arc::new(GeminiSummarizer::new(
        config.summarizer.base_url.clone(),
        api_key,
        config.summarizer.model.clone(),
        config.summary_lengths,
        config.key_points,
    )))
}
