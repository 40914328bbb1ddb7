//! tldw: too long; didn't watch.
//!
//! A polling-driven video summarization service. Clients POST a YouTube URL,
//! receive a job id, and poll it; each poll advances the job through
//! transcript acquisition and summarization against two external providers.
//! Completed summaries land in a TTL cache keyed by request fingerprint, and
//! a sliding-window limiter keeps callers honest.

pub mod cache;
pub mod chunker;
pub mod config;
pub mod driver;
pub mod error;
pub mod http;
pub mod job;
pub mod providers;
pub mod ratelimit;
pub mod sanitize;
pub mod store;
pub mod validate;
