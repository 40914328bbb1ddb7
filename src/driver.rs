//! Job state machine and the polling-driven progress driver.
//!
//! Progress happens only inside client polls: a GET loads the job, performs
//! at most one transcript interaction; once the transcript is in hand it
//! runs the summarize stage to completion in the same request. The transcript
//! itself never touches the store; it lives only in the memory of the request
//! that obtained it.
//!
//! Cancellation is cooperative. Before every persist the driver re-reads the
//! job and discards its work if a DELETE won the race.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::cache::{CacheEntry, CacheMeta, SummaryCache};
use crate::chunker::{ChunkConfig, chunk_transcript};
use crate::config::{ChunkingConfig, KeyPointBounds, SummaryLengths};
use crate::error::{JobFailure, StoreError, SummarizerError};
use crate::job::{Job, JobInput, JobStage, JobStatus, SummaryFormat, SummaryLength, SummaryResult};
use crate::providers::{
    Summarizer, SummaryDraft, TranscriptOutcome, TranscriptPoll, TranscriptProvider,
};
use crate::store::{KvStore, job_key};

/// Outcome of a DELETE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    /// Missing, expired, or already terminal.
    NotFound,
}

/// What the pre-write re-read found.
enum PersistGate {
    Written,
    /// A cancel won the race; the stored record is returned untouched.
    Superseded(Job),
    /// The record expired mid-poll.
    Gone,
}

/// Why a summarize run stopped short of a result.
enum SummarizeAbort {
    Cancelled(Job),
    Summarizer(SummarizerError),
    Store(StoreError),
}

pub struct JobDriver {
    store: Arc<dyn KvStore>,
    cache: SummaryCache,
    transcript: Arc<dyn TranscriptProvider>,
    summarizer: Arc<dyn Summarizer>,
    chunking: ChunkingConfig,
    lengths: SummaryLengths,
    key_points: KeyPointBounds,
    job_ttl: Duration,
}

impl JobDriver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn KvStore>,
        cache: SummaryCache,
        transcript: Arc<dyn TranscriptProvider>,
        summarizer: Arc<dyn Summarizer>,
        chunking: ChunkingConfig,
        lengths: SummaryLengths,
        key_points: KeyPointBounds,
        job_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            transcript,
            summarizer,
            chunking,
            lengths,
            key_points,
            job_ttl,
        }
    }

    /// Mint and persist a fresh job in `processing/transcript`.
    pub async fn create(&self, input: JobInput) -> Result<Job, StoreError> {
        let job = Job::new(input);
        self.persist(&job).await?;
        tracing::info!(job_id = %job.id, url = %job.input.canonical_url, "Job created");
        Ok(job)
    }

    /// Load the job and advance it as far as this poll can take it. Returns
    /// `None` when the id is unknown or expired.
    pub async fn poll(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let Some(job) = self.load(id).await? else {
            return Ok(None);
        };
        if job.status.is_terminal() {
            return Ok(Some(job));
        }
        self.advance(job).await.map(Some)
    }

    /// Cooperatively cancel a live job.
    pub async fn cancel(&self, id: &str) -> Result<CancelOutcome, StoreError> {
        let Some(mut job) = self.load(id).await? else {
            return Ok(CancelOutcome::NotFound);
        };
        if job.status.is_terminal() {
            return Ok(CancelOutcome::NotFound);
        }
        job.status = JobStatus::Cancelled;
        job.touch();
        self.persist(&job).await?;
        tracing::info!(job_id = %job.id, "Job cancelled");
        Ok(CancelOutcome::Cancelled)
    }

    async fn advance(&self, mut job: Job) -> Result<Job, StoreError> {
        let payload = match job.transcript.remote_job_handle.clone() {
            None => {
                let outcome = self
                    .transcript
                    .request_transcript(
                        &job.input.url,
                        job.input.lang.as_request_param(),
                        job.transcript.mode,
                    )
                    .await;
                match outcome {
                    Ok(TranscriptOutcome::Ready(payload)) => payload,
                    Ok(TranscriptOutcome::Async { remote_handle }) => {
                        job.transcript.remote_job_handle = Some(remote_handle);
                        job.transcript.provider_status = Some("queued".to_string());
                        job.touch();
                        return match self.persist_checked(&job).await? {
                            PersistGate::Superseded(stored) => Ok(stored),
                            _ => Ok(job),
                        };
                    }
                    Err(e) => return self.fail(job, JobFailure::from_transcript(&e)).await,
                }
            }
            Some(handle) => match self.transcript.poll_transcript_job(&handle).await {
                // Informational only: the projection shows the remote status,
                // but a no-progress observation persists nothing.
                Ok(TranscriptPoll::Queued) => {
                    job.transcript.provider_status = Some("queued".to_string());
                    return Ok(job);
                }
                Ok(TranscriptPoll::Active) => {
                    job.transcript.provider_status = Some("active".to_string());
                    return Ok(job);
                }
                Ok(TranscriptPoll::Completed(payload)) => payload,
                Ok(TranscriptPoll::Failed(e)) => {
                    return self.fail(job, JobFailure::from_transcript(&e)).await;
                }
                Err(e) => return self.fail(job, JobFailure::from_transcript(&e)).await,
            },
        };

        // Transcript in hand: record what the provider resolved, enter the
        // summarize stage, and finish it within this request. The transcript
        // only exists here.
        job.transcript.remote_job_handle = None;
        job.transcript.transcript_lang = payload.lang.clone();
        job.transcript.available_langs = payload.available_langs.clone();
        job.transcript.provider_status = Some("completed".to_string());
        job.stage = JobStage::Summarize;
        job.touch();

        match self.persist_checked(&job).await? {
            PersistGate::Written => {}
            PersistGate::Superseded(stored) => {
                tracing::info!(job_id = %job.id, "Discarding transcript for cancelled job");
                return Ok(stored);
            }
            PersistGate::Gone => {
                tracing::warn!(job_id = %job.id, "Job record expired mid-poll");
                return Ok(job);
            }
        }

        match self.summarize_transcript(&job, &payload.content).await {
            Ok(result) => self.complete(job, result).await,
            Err(SummarizeAbort::Cancelled(stored)) => {
                tracing::info!(job_id = %job.id, "Discarding summary work for cancelled job");
                Ok(stored)
            }
            Err(SummarizeAbort::Summarizer(e)) => {
                self.fail(job, JobFailure::from_summarizer(&e)).await
            }
            Err(SummarizeAbort::Store(e)) => {
                self.fail(job, JobFailure::backend(format!("state refresh failed: {e}")))
                    .await
            }
        }
    }

    /// Run the chunk-and-reduce engine over the in-memory transcript.
    async fn summarize_transcript(
        &self,
        job: &Job,
        transcript: &str,
    ) -> Result<SummaryResult, SummarizeAbort> {
        let options = job.input.options;

        let draft = if transcript.len() <= self.chunking.transcript_max_chars {
            self.guarded_summarize(job, transcript, options.length, options.format)
                .await?
        } else {
            let chunks = chunk_transcript(
                transcript,
                &ChunkConfig {
                    min_chars: self.chunking.chunk_min_chars,
                    max_chars: self.chunking.chunk_max_chars,
                },
            );
            tracing::info!(
                job_id = %job.id,
                chunks = chunks.len(),
                transcript_chars = transcript.len(),
                "Transcript over single-call threshold, running map/reduce"
            );

            let mut partials = Vec::with_capacity(chunks.len());
            for chunk in &chunks {
                let partial = self
                    .guarded_summarize(job, chunk, SummaryLength::Standard, SummaryFormat::Paragraph)
                    .await?;
                partials.push(partial.summary);
            }

            let joined = partials.join("\n\n");
            self.guarded_summarize(job, &joined, options.length, options.format)
                .await?
        };

        Ok(SummaryResult {
            summary: draft.summary,
            key_points: draft.key_points,
            confidence: draft.confidence,
            model_id: self.summarizer.model_id().to_string(),
        })
    }

    /// One summarizer call bracketed by a cancellation check and output
    /// validation.
    async fn guarded_summarize(
        &self,
        job: &Job,
        text: &str,
        length: SummaryLength,
        format: SummaryFormat,
    ) -> Result<SummaryDraft, SummarizeAbort> {
        self.abort_if_cancelled(job).await?;
        let draft = self
            .summarizer
            .summarize(text, length, format)
            .await
            .map_err(SummarizeAbort::Summarizer)?;
        self.validate_draft(&draft, length)
            .map_err(SummarizeAbort::Summarizer)?;
        Ok(draft)
    }

    /// Enforce the output contract on a summarizer draft.
    fn validate_draft(
        &self,
        draft: &SummaryDraft,
        length: SummaryLength,
    ) -> Result<(), SummarizerError> {
        let window = self.lengths.window(length);
        let chars = draft.summary.chars().count();
        if chars < window.min_chars || chars > window.max_chars {
            return Err(SummarizerError::InvalidResponse {
                reason: format!(
                    "summary length {chars} outside {}-{}",
                    window.min_chars, window.max_chars
                ),
            });
        }

        let points = draft.key_points.len();
        if points < self.key_points.min || points > self.key_points.max {
            return Err(SummarizerError::InvalidResponse {
                reason: format!(
                    "{points} key points outside {}-{}",
                    self.key_points.min, self.key_points.max
                ),
            });
        }
        if draft.key_points.iter().any(|p| p.trim().is_empty()) {
            return Err(SummarizerError::InvalidResponse {
                reason: "empty key point".to_string(),
            });
        }

        if draft.confidence > 100 {
            return Err(SummarizerError::InvalidResponse {
                reason: format!("confidence {} outside 0-100", draft.confidence),
            });
        }
        Ok(())
    }

    async fn complete(&self, mut job: Job, result: SummaryResult) -> Result<Job, StoreError> {
        let entry = CacheEntry {
            result: result.clone(),
            meta: CacheMeta {
                transcript_lang: job.transcript.transcript_lang.clone(),
                available_langs: job.transcript.available_langs.clone(),
            },
            created_at: Utc::now(),
        };
        job.complete(result);

        match self.persist_checked(&job).await? {
            PersistGate::Superseded(stored) => {
                tracing::info!(job_id = %job.id, "Discarding summary for cancelled job");
                return Ok(stored);
            }
            PersistGate::Gone => {
                tracing::warn!(job_id = %job.id, "Job record expired before completion write");
                return Ok(job);
            }
            PersistGate::Written => {}
        }

        if let Err(e) = self
            .cache
            .store(&job.input.canonical_url, &job.input.options, &entry)
            .await
        {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to write summary cache");
        }

        tracing::info!(job_id = %job.id, "Job completed");
        Ok(job)
    }

    async fn fail(&self, mut job: Job, failure: JobFailure) -> Result<Job, StoreError> {
        tracing::warn!(
            job_id = %job.id,
            code = %failure.code,
            provider = ?failure.provider,
            "Job failed"
        );
        job.fail(failure);
        match self.persist_checked(&job).await? {
            PersistGate::Superseded(stored) => Ok(stored),
            _ => Ok(job),
        }
    }

    async fn abort_if_cancelled(&self, job: &Job) -> Result<(), SummarizeAbort> {
        match self.load(&job.id).await.map_err(SummarizeAbort::Store)? {
            Some(stored) if stored.status == JobStatus::Cancelled => {
                Err(SummarizeAbort::Cancelled(stored))
            }
            _ => Ok(()),
        }
    }

    /// Re-read the job, then write, aborting if a cancel landed in between.
    /// The re-check narrows the race but cannot close it; a cancel that lands
    /// inside this gap is overwritten, and clients repeat DELETE until GET
    /// returns 410.
    async fn persist_checked(&self, job: &Job) -> Result<PersistGate, StoreError> {
        match self.load(&job.id).await? {
            None => Ok(PersistGate::Gone),
            Some(stored) if stored.status == JobStatus::Cancelled => {
                Ok(PersistGate::Superseded(stored))
            }
            Some(_) => {
                self.persist(job).await?;
                Ok(PersistGate::Written)
            }
        }
    }

    async fn load(&self, id: &str) -> Result<Option<Job>, StoreError> {
        match self.store.get(&job_key(id)).await? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StoreError::Decode {
                    reason: e.to_string(),
                }),
        }
    }

    async fn persist(&self, job: &Job) -> Result<(), StoreError> {
        let raw = serde_json::to_string(job).map_err(|e| StoreError::Decode {
            reason: e.to_string(),
        })?;
        self.store.put(&job_key(&job.id), &raw, self.job_ttl).await
    }
}
