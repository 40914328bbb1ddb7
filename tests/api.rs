//! Subcutaneous HTTP tests for the summaries API.
//!
//! These spin up the full axum router with the in-memory store and stub
//! providers. No network, no real transcript service, no real model.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

use tldw::cache::SummaryCache;
use tldw::config::{ChunkingConfig, KeyPointBounds, LengthWindow, RateLimitConfig, SummaryLengths};
use tldw::driver::JobDriver;
use tldw::error::{SummarizerError, TranscriptError};
use tldw::http::{AppState, router};
use tldw::job::{SummaryFormat, SummaryLength, TranscriptMode};
use tldw::providers::{
    Summarizer, SummaryDraft, TranscriptOutcome, TranscriptPayload, TranscriptPoll,
    TranscriptProvider,
};
use tldw::ratelimit::RateLimiter;
use tldw::store::{KvStore, MemoryStore, job_key};
use tldw::validate::UrlValidator;

const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

// ─── Stub providers ──────────────────────────────────────────────────────────

/// Scripted transcript provider.
enum TranscriptBehavior {
    Ready { content: String },
    Unavailable,
    Async {
        handle: String,
        polls: Mutex<VecDeque<Result<TranscriptPoll, TranscriptError>>>,
    },
}

struct StubTranscripts {
    behavior: TranscriptBehavior,
}

impl StubTranscripts {
    fn ready(content: &str) -> Arc<Self> {
        Arc::new(Self {
            behavior: TranscriptBehavior::Ready {
                content: content.to_string(),
            },
        })
    }

    fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            behavior: TranscriptBehavior::Unavailable,
        })
    }

    fn with_remote_job(polls: Vec<Result<TranscriptPoll, TranscriptError>>) -> Arc<Self> {
        Arc::new(Self {
            behavior: TranscriptBehavior::Async {
                handle: "remote-123".to_string(),
                polls: Mutex::new(polls.into()),
            },
        })
    }
}

fn payload(content: &str) -> TranscriptPayload {
    TranscriptPayload {
        content: content.to_string(),
        lang: Some("en".to_string()),
        available_langs: vec!["en".to_string(), "ru".to_string()],
    }
}

#[async_trait::async_trait]
impl TranscriptProvider for StubTranscripts {
    async fn request_transcript(
        &self,
        _url: &str,
        _lang: Option<&str>,
        _mode: TranscriptMode,
    ) -> Result<TranscriptOutcome, TranscriptError> {
        match &self.behavior {
            TranscriptBehavior::Ready { content } => {
                Ok(TranscriptOutcome::Ready(payload(content)))
            }
            TranscriptBehavior::Unavailable => Err(TranscriptError::Unavailable {
                reason: "no captions for this video".to_string(),
            }),
            TranscriptBehavior::Async { handle, .. } => Ok(TranscriptOutcome::Async {
                remote_handle: handle.clone(),
            }),
        }
    }

    async fn poll_transcript_job(
        &self,
        _handle: &str,
    ) -> Result<TranscriptPoll, TranscriptError> {
        match &self.behavior {
            TranscriptBehavior::Async { polls, .. } => polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(TranscriptPoll::Queued)),
            _ => unreachable!("poll not expected for this behavior"),
        }
    }
}

/// Recording summarizer that always produces a valid draft.
#[derive(Default)]
struct StubSummarizer {
    calls: Mutex<Vec<(usize, SummaryLength, SummaryFormat)>>,
}

#[async_trait::async_trait]
impl Summarizer for StubSummarizer {
    async fn summarize(
        &self,
        text: &str,
        length: SummaryLength,
        format: SummaryFormat,
    ) -> Result<SummaryDraft, SummarizerError> {
        self.calls.lock().unwrap().push((text.len(), length, format));
        Ok(SummaryDraft {
            summary: format!("A concise recap of {} characters of transcript.", text.len()),
            key_points: (1..=5).map(|i| format!("Key point {i}")).collect(),
            confidence: 87,
        })
    }

    fn model_id(&self) -> &str {
        "stub-model"
    }
}

/// Summarizer that cancels its own job through the store mid-call, modeling a
/// DELETE racing an in-flight provider request.
struct CancelDuringSummarize {
    store: Arc<dyn KvStore>,
    job_id: Mutex<Option<String>>,
}

#[async_trait::async_trait]
impl Summarizer for CancelDuringSummarize {
    async fn summarize(
        &self,
        _text: &str,
        _length: SummaryLength,
        _format: SummaryFormat,
    ) -> Result<SummaryDraft, SummarizerError> {
        let id = self.job_id.lock().unwrap().clone().expect("job id seeded");
        let raw = self.store.get(&job_key(&id)).await.unwrap().unwrap();
        let mut record: Value = serde_json::from_str(&raw).unwrap();
        record["status"] = json!("cancelled");
        self.store
            .put(&job_key(&id), &record.to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        Ok(SummaryDraft {
            summary: "A summary that must be discarded.".to_string(),
            key_points: (1..=5).map(|i| format!("Key point {i}")).collect(),
            confidence: 50,
        })
    }

    fn model_id(&self) -> &str {
        "stub-model"
    }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

fn generous_lengths() -> SummaryLengths {
    let window = LengthWindow {
        min_chars: 5,
        max_chars: 10_000,
    };
    SummaryLengths {
        short: window,
        standard: window,
        detailed: window,
    }
}

struct TestApp {
    app: Router,
    store: Arc<dyn KvStore>,
}

fn build_app(
    transcript: Arc<dyn TranscriptProvider>,
    summarizer: Arc<dyn Summarizer>,
    chunking: ChunkingConfig,
    rate: Option<(u32, u32)>,
) -> TestApp {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let cache = SummaryCache::new(store.clone(), Duration::from_secs(3_600));

    let limiter = match rate {
        Some((post_rpm, get_rpm)) => RateLimiter::new(
            store.clone(),
            &RateLimitConfig {
                enabled: true,
                post_rpm,
                get_rpm,
                window_secs: 60,
            },
            true,
        ),
        None => RateLimiter::new(store.clone(), &RateLimitConfig::default(), false),
    };

    let driver = JobDriver::new(
        store.clone(),
        cache.clone(),
        transcript,
        summarizer,
        chunking,
        generous_lengths(),
        KeyPointBounds { min: 5, max: 9 },
        Duration::from_secs(3_600),
    );

    let state = AppState::new(
        UrlValidator::default(),
        limiter,
        cache,
        Some(Arc::new(driver)),
        None,
    );
    TestApp {
        app: router(state),
        store,
    }
}

fn simple_app(transcript: Arc<dyn TranscriptProvider>) -> (TestApp, Arc<StubSummarizer>) {
    let summarizer = Arc::new(StubSummarizer::default());
    let app = build_app(
        transcript,
        summarizer.clone(),
        ChunkingConfig::default(),
        None,
    );
    (app, summarizer)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

async fn post_json(app: &Router, body: Value) -> (StatusCode, axum::http::HeaderMap, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri("/api/v1/summaries")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

async fn get_job(app: &Router, job_id: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
    send(
        app,
        Request::builder()
            .method("GET")
            .uri(format!("/api/v1/summaries/{job_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

async fn delete_job(app: &Router, job_id: &str) -> StatusCode {
    let (status, _, _) = send(
        app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/v1/summaries/{job_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    status
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn happy_path_completes_then_serves_from_cache() {
    let (harness, summarizer) = simple_app(StubTranscripts::ready(
        "First sentence of the talk. Second sentence of the talk.",
    ));
    let app = &harness.app;

    let (status, _, created) = post_json(app, json!({ "url": VIDEO_URL })).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(created["status"], "processing");
    assert_eq!(created["stage"], "transcript");
    let job_id = created["jobId"].as_str().unwrap().to_string();
    assert_ne!(job_id, "cached");

    // The job record landed in the store under its namespace.
    let keys = harness.store.keys_with_prefix("job:").await.unwrap();
    assert_eq!(keys.len(), 1);

    // One poll is enough: the transcript is synchronous, so summarize runs in
    // the same request.
    let (status, _, completed) = get_job(app, &job_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");
    let key_points = completed["result"]["keyPoints"].as_array().unwrap();
    assert!((5..=9).contains(&key_points.len()));
    let confidence = completed["result"]["confidence"].as_u64().unwrap();
    assert!(confidence <= 100);
    assert_eq!(completed["result"]["modelId"], "stub-model");
    assert_eq!(completed["meta"]["transcriptLang"], "en");

    // Polling a terminal job returns the stored projection without new
    // summarizer work.
    let calls_after_completion = summarizer.calls.lock().unwrap().len();
    let (status, _, again) = get_job(app, &job_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["result"], completed["result"]);
    assert_eq!(summarizer.calls.lock().unwrap().len(), calls_after_completion);

    // An identical POST now hits the cache: synthetic projection, no new job.
    let (status, _, cached) = post_json(app, json!({ "url": VIDEO_URL })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cached["jobId"], "cached");
    assert_eq!(cached["status"], "completed");
    assert_eq!(cached["result"], completed["result"]);
    let keys = harness.store.keys_with_prefix("job:").await.unwrap();
    assert_eq!(keys.len(), 1, "cache hit must not materialize a job");

    // A short-link spelling of the same video shares the fingerprint.
    let (status, _, cached) =
        post_json(app, json!({ "url": "https://youtu.be/dQw4w9WgXcQ" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cached["jobId"], "cached");

    // Different options miss the cache and start a fresh job.
    let (status, _, fresh) = post_json(
        app,
        json!({ "url": VIDEO_URL, "options": { "length": "detailed" } }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_ne!(fresh["jobId"], "cached");
}

#[tokio::test]
async fn invalid_urls_are_rejected() {
    let (harness, _) = simple_app(StubTranscripts::ready("Text."));
    let app = &harness.app;

    let (status, _, body) = post_json(app, json!({ "url": "https://example.com" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");

    // SSRF attempt with a loopback literal.
    let (status, _, body) =
        post_json(app, json!({ "url": "https://127.0.0.1/watch?v=abc" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");

    // Malformed JSON body.
    let (status, _, body) = send(
        app,
        Request::builder()
            .method("POST")
            .uri("/api/v1/summaries")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");

    // Unknown language preference.
    let (status, _, body) = post_json(app, json!({ "url": VIDEO_URL, "lang": "fr" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");

    // Titles: overlong and markup-bearing.
    let (status, _, _) = post_json(
        app,
        json!({ "url": VIDEO_URL, "title": "x".repeat(121) }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _, _) = post_json(
        app,
        json!({ "url": VIDEO_URL, "title": "<b>bold</b>" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancellation_is_observed_and_sticky() {
    let (harness, _) = simple_app(StubTranscripts::ready("Some transcript."));
    let app = &harness.app;

    let (_, _, created) = post_json(app, json!({ "url": VIDEO_URL })).await;
    let job_id = created["jobId"].as_str().unwrap().to_string();

    assert_eq!(delete_job(app, &job_id).await, StatusCode::NO_CONTENT);

    let (status, _, body) = get_job(app, &job_id).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"]["code"], "JOB_CANCELLED");

    // DELETE on a terminal job is a no-op 404; GET keeps returning 410.
    assert_eq!(delete_job(app, &job_id).await, StatusCode::NOT_FOUND);
    let (status, _, _) = get_job(app, &job_id).await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn in_flight_results_are_discarded_after_cancel() {
    // Build the app around a summarizer that flips the job to cancelled while
    // it "runs", then hand it the store and job id.
    let transcript = StubTranscripts::ready("A transcript that will be summarized.");
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let summarizer = Arc::new(CancelDuringSummarize {
        store: store.clone(),
        job_id: Mutex::new(None),
    });
    let cache = SummaryCache::new(store.clone(), Duration::from_secs(3_600));
    let driver = JobDriver::new(
        store.clone(),
        cache.clone(),
        transcript,
        summarizer.clone(),
        ChunkingConfig::default(),
        generous_lengths(),
        KeyPointBounds { min: 5, max: 9 },
        Duration::from_secs(3_600),
    );
    let limiter = RateLimiter::new(store.clone(), &RateLimitConfig::default(), false);
    let app = router(AppState::new(
        UrlValidator::default(),
        limiter,
        cache,
        Some(Arc::new(driver)),
        None,
    ));

    let (_, _, created) = post_json(&app, json!({ "url": VIDEO_URL })).await;
    let job_id = created["jobId"].as_str().unwrap().to_string();
    *summarizer.job_id.lock().unwrap() = Some(job_id.clone());

    // The poll runs the summarizer, which cancels the job mid-flight; the
    // completed summary must be dropped, not persisted.
    let (status, _, body) = get_job(&app, &job_id).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"]["code"], "JOB_CANCELLED");

    let raw = store.get(&job_key(&job_id)).await.unwrap().unwrap();
    let record: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(record["status"], "cancelled");
    assert!(record.get("result").is_none_or(Value::is_null));

    // And nothing was cached for this fingerprint.
    let cache_keys = store.keys_with_prefix("cache:").await.unwrap();
    assert!(cache_keys.is_empty());
}

#[tokio::test]
async fn transcript_unavailable_fails_the_job() {
    let (harness, _) = simple_app(StubTranscripts::unavailable());
    let app = &harness.app;

    let (_, _, created) = post_json(app, json!({ "url": VIDEO_URL })).await;
    let job_id = created["jobId"].as_str().unwrap().to_string();

    let (status, _, body) = get_job(app, &job_id).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["error"]["code"], "TRANSCRIPT_UNAVAILABLE");
    assert_eq!(body["error"]["provider"], "transcript");

    // Failed jobs stay failed on re-poll.
    let (status, _, body) = get_job(app, &job_id).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "TRANSCRIPT_UNAVAILABLE");
}

#[tokio::test]
async fn oversize_transcripts_are_mapped_then_reduced() {
    let sentence = "This sentence pads the transcript body nicely. ";
    let transcript: String = sentence.repeat(5); // 235 bytes > 200
    let chunking = ChunkingConfig {
        transcript_max_chars: 200,
        chunk_min_chars: 50,
        chunk_max_chars: 120,
    };

    let summarizer = Arc::new(StubSummarizer::default());
    let harness = build_app(
        StubTranscripts::ready(&transcript),
        summarizer.clone(),
        chunking,
        None,
    );
    let app = &harness.app;

    let (_, _, created) = post_json(
        app,
        json!({ "url": VIDEO_URL, "options": { "length": "detailed", "format": "bullets" } }),
    )
    .await;
    let job_id = created["jobId"].as_str().unwrap().to_string();

    let (status, _, body) = get_job(app, &job_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    let calls = summarizer.calls.lock().unwrap();
    assert!(calls.len() >= 3, "expected >= 2 map calls plus one reduce");

    let (map_calls, reduce_call) = calls.split_at(calls.len() - 1);
    for (len, length, format) in map_calls {
        assert!(*len <= chunking.chunk_max_chars, "map chunk over ceiling");
        assert_eq!(*length, SummaryLength::Standard);
        assert_eq!(*format, SummaryFormat::Paragraph);
    }
    let (_, reduce_length, reduce_format) = reduce_call[0];
    assert_eq!(reduce_length, SummaryLength::Detailed);
    assert_eq!(reduce_format, SummaryFormat::Bullets);
}

#[tokio::test]
async fn post_quota_is_enforced_with_headers() {
    let summarizer = Arc::new(StubSummarizer::default());
    let harness = build_app(
        StubTranscripts::ready("Text."),
        summarizer,
        ChunkingConfig::default(),
        Some((2, 120)),
    );
    let app = &harness.app;

    let (status, headers, _) = post_json(app, json!({ "url": VIDEO_URL })).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(headers["x-ratelimit-limit"], "2");
    assert_eq!(headers["x-ratelimit-remaining"], "1");

    let (status, headers, _) = post_json(app, json!({ "url": VIDEO_URL })).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(headers["x-ratelimit-remaining"], "0");

    let (status, headers, body) = post_json(app, json!({ "url": VIDEO_URL })).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
    assert_eq!(headers["x-ratelimit-remaining"], "0");
    let retry_after: u64 = headers["retry-after"].to_str().unwrap().parse().unwrap();
    assert!(retry_after >= 1);
    assert!(headers.contains_key("x-ratelimit-reset"));
}

#[tokio::test]
async fn async_transcript_jobs_advance_across_polls() {
    let transcript = StubTranscripts::with_remote_job(vec![
        Ok(TranscriptPoll::Queued),
        Ok(TranscriptPoll::Active),
        Ok(TranscriptPoll::Completed(payload(
            "The transcript that took a while.",
        ))),
    ]);
    let (harness, _) = simple_app(transcript);
    let app = &harness.app;

    let (_, _, created) = post_json(app, json!({ "url": VIDEO_URL })).await;
    let job_id = created["jobId"].as_str().unwrap().to_string();

    // Poll 1 registers the remote job.
    let (status, _, body) = get_job(app, &job_id).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["stage"], "transcript");
    assert_eq!(body["providerStatus"], "queued");

    // Polls 2 and 3 observe the remote job still running.
    let (status, _, body) = get_job(app, &job_id).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["providerStatus"], "queued");
    let (status, _, body) = get_job(app, &job_id).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["providerStatus"], "active");

    // Poll 4 sees completion and finishes summarize in the same request.
    let (status, _, body) = get_job(app, &job_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["meta"]["transcriptLang"], "en");
}

#[tokio::test]
async fn failed_remote_transcript_jobs_fail_the_job() {
    let transcript = StubTranscripts::with_remote_job(vec![Ok(TranscriptPoll::Failed(
        TranscriptError::VideoUnavailable {
            reason: "video was taken down".to_string(),
        },
    ))]);
    let (harness, _) = simple_app(transcript);
    let app = &harness.app;

    let (_, _, created) = post_json(app, json!({ "url": VIDEO_URL })).await;
    let job_id = created["jobId"].as_str().unwrap().to_string();

    let (_, _, _) = get_job(app, &job_id).await; // registers the remote job
    let (status, _, body) = get_job(app, &job_id).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "VIDEO_UNAVAILABLE");
    assert_eq!(body["error"]["provider"], "transcript");
}

#[tokio::test]
async fn unknown_jobs_are_not_found() {
    let (harness, _) = simple_app(StubTranscripts::ready("Text."));
    let app = &harness.app;

    let (status, _, body) = get_job(app, "deadbeef").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "JOB_NOT_FOUND");

    assert_eq!(delete_job(app, "deadbeef").await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_credentials_surface_as_configuration_error() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let cache = SummaryCache::new(store.clone(), Duration::from_secs(60));
    let limiter = RateLimiter::new(store.clone(), &RateLimitConfig::default(), false);
    let app = router(AppState::new(
        UrlValidator::default(),
        limiter,
        cache,
        None,
        Some("missing required setting GEMINI_API_KEY".to_string()),
    ));

    let (status, _, body) = post_json(&app, json!({ "url": VIDEO_URL })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "CONFIGURATION_ERROR");

    let (status, _, body) = get_job(&app, "any").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "CONFIGURATION_ERROR");
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let (harness, _) = simple_app(StubTranscripts::ready("Text."));
    let (status, _, body) = send(
        &harness.app,
        Request::builder()
            .method("GET")
            .uri("/healthz")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
