//! Job records and the vocabulary types they carry.
//!
//! A job is the unit of work behind one summary request. It lives in the KV
//! store under `job:{id}` for the job TTL and moves strictly forward:
//! `processing/transcript` → `processing/summarize` → a terminal status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JobFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal jobs never mutate again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Processing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStage {
    Transcript,
    Summarize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    Short,
    #[default]
    Standard,
    Detailed,
}

impl SummaryLength {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Standard => "standard",
            Self::Detailed => "detailed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SummaryFormat {
    Bullets,
    #[default]
    Paragraph,
}

impl SummaryFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bullets => "bullets",
            Self::Paragraph => "paragraph",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptMode {
    Native,
    #[default]
    Auto,
    Generate,
}

impl TranscriptMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Auto => "auto",
            Self::Generate => "generate",
        }
    }
}

/// Preferred transcript language. Advisory: the provider may resolve a
/// different language, and the job reports whatever actually came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LangPref {
    #[default]
    Auto,
    En,
    Ru,
}

impl LangPref {
    /// The value forwarded to the transcript provider, if any.
    pub fn as_request_param(self) -> Option<&'static str> {
        match self {
            Self::Auto => None,
            Self::En => Some("en"),
            Self::Ru => Some("ru"),
        }
    }
}

/// Client-tunable summary knobs. Defaults are part of the cache contract:
/// omitted knobs canonicalize to the same fingerprint as explicit defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SummaryOptions {
    pub length: SummaryLength,
    pub format: SummaryFormat,
    pub transcript_mode: TranscriptMode,
}

impl SummaryOptions {
    /// Deterministic rendering used for cache fingerprints: fixed key order,
    /// every knob explicit.
    pub fn canonical(&self) -> String {
        format!(
            "length={};format={};transcriptMode={}",
            self.length.as_str(),
            self.format.as_str(),
            self.transcript_mode.as_str()
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInput {
    /// URL exactly as the client sent it.
    pub url: String,
    /// Canonical watch URL derived during validation; the cache key source.
    pub canonical_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub lang: LangPref,
    #[serde(default)]
    pub options: SummaryOptions,
}

/// Where transcript acquisition currently stands.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptContext {
    pub mode: TranscriptMode,
    /// Set when the provider went async; cleared once the remote job resolves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_job_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_lang: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available_langs: Vec<String>,
    /// Last-known remote status. Informational only, never authoritative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResult {
    pub summary: String,
    pub key_points: Vec<String>,
    /// Integer 0–100.
    pub confidence: u8,
    pub model_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub stage: JobStage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub input: JobInput,
    #[serde(default)]
    pub transcript: TranscriptContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SummaryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
}

impl Job {
    pub fn new(input: JobInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            status: JobStatus::Processing,
            stage: JobStage::Transcript,
            created_at: now,
            updated_at: now,
            transcript: TranscriptContext {
                mode: input.options.transcript_mode,
                ..TranscriptContext::default()
            },
            input,
            result: None,
            error: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self, result: SummaryResult) {
        self.status = JobStatus::Completed;
        self.result = Some(result);
        self.touch();
    }

    pub fn fail(&mut self, failure: JobFailure) {
        self.status = JobStatus::Failed;
        self.error = Some(failure);
        self.touch();
    }
}
