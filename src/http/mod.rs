//! HTTP surface: router, shared state, and the server loop.
//!
//! Three API routes drive the whole pipeline (create, poll, cancel) plus a
//! liveness probe. Handlers hold no state of their own; everything hangs off
//! [`AppState`], built once at startup.

mod error;
mod handlers;
pub mod types;

pub use error::ApiError;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::cache::SummaryCache;
use crate::config::Config;
use crate::driver::JobDriver;
use crate::error::ConfigError;
use crate::providers::{create_summarizer, create_transcript_provider};
use crate::ratelimit::RateLimiter;
use crate::store::{KvStore, StoreBackend, create_store};
use crate::validate::UrlValidator;

/// Maximum JSON body size for API requests (64 KB).
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    validator: UrlValidator,
    limiter: RateLimiter,
    cache: SummaryCache,
    driver: Option<Arc<JobDriver>>,
    config_error: Option<String>,
}

impl AppState {
    pub fn new(
        validator: UrlValidator,
        limiter: RateLimiter,
        cache: SummaryCache,
        driver: Option<Arc<JobDriver>>,
        config_error: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                validator,
                limiter,
                cache,
                driver,
                config_error,
            }),
        }
    }

    /// Wire the full production state from configuration. Missing provider
    /// credentials do not prevent startup; they turn every request into a
    /// `CONFIGURATION_ERROR` until fixed.
    pub fn from_config(config: &Config) -> Self {
        let (store, backend) = create_store(config.kv.as_ref());

        let limiter_enabled = config.rate_limit.enabled && backend == StoreBackend::Remote;
        if config.rate_limit.enabled && backend == StoreBackend::Memory {
            tracing::warn!("Rate limiting bypassed: no remote KV configured");
        }
        let limiter = RateLimiter::new(store.clone(), &config.rate_limit, limiter_enabled);

        let cache = SummaryCache::new(
            store.clone(),
            Duration::from_secs(config.ttl.cache_secs),
        );
        let validator = UrlValidator::new(config.allowed_hosts.clone());

        let (driver, config_error) = match build_driver(config, store, cache.clone()) {
            Ok(driver) => (Some(Arc::new(driver)), None),
            Err(e) => {
                tracing::warn!(error = %e, "Provider configuration incomplete, requests will fail");
                (None, Some(e.to_string()))
            }
        };

        Self::new(validator, limiter, cache, driver, config_error)
    }

    pub(crate) fn validator(&self) -> &UrlValidator {
        &self.inner.validator
    }

    pub(crate) fn limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    pub(crate) fn cache(&self) -> &SummaryCache {
        &self.inner.cache
    }

    pub(crate) fn driver(&self) -> Result<Arc<JobDriver>, ApiError> {
        self.inner.driver.clone().ok_or_else(|| {
            ApiError::configuration(
                self.inner
                    .config_error
                    .clone()
                    .unwrap_or_else(|| "service is not configured".to_string()),
            )
        })
    }
}

fn build_driver(
    config: &Config,
    store: Arc<dyn KvStore>,
    cache: SummaryCache,
) -> Result<JobDriver, ConfigError> {
    let transcript = create_transcript_provider(config)?;
    let summarizer = create_summarizer(config)?;
    Ok(JobDriver::new(
        store,
        cache,
        transcript,
        summarizer,
        config.chunking,
        config.summary_lengths,
        config.key_points,
        Duration::from_secs(config.ttl.job_secs),
    ))
}

/// Build the axum router with all layers applied.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health))
        .route("/api/v1/summaries", post(handlers::create_summary))
        .route(
            "/api/v1/summaries/{job_id}",
            get(handlers::get_summary).delete(handlers::cancel_summary),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}
