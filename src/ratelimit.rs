//! Sliding-window rate limiting over the shared KV store.
//!
//! Each `(class, identity)` pair keeps a vector of request timestamps under a
//! `ratelimit:` key; a check prunes the window, compares against the class
//! quota, and appends on success. Limiting is best-effort by design: when the
//! feature is off, or the store misbehaves, requests pass.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::RateLimitConfig;
use crate::error::StoreError;
use crate::store::{KvStore, RATE_LIMIT_PREFIX};

/// Which quota a request draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodClass {
    Post,
    Get,
}

impl MethodClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Get => "get",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch milliseconds at which the oldest windowed request ages out.
    pub reset_at_ms: u64,
}

impl RateLimitDecision {
    /// Whole seconds until the window frees a slot, at least 1.
    pub fn retry_after_secs(&self) -> u64 {
        let remaining_ms = self.reset_at_ms.saturating_sub(now_ms());
        remaining_ms.div_ceil(1000).max(1)
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    enabled: bool,
    post_rpm: u32,
    get_rpm: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KvStore>, config: &RateLimitConfig, enabled: bool) -> Self {
        Self {
            store,
            enabled,
            post_rpm: config.post_rpm,
            get_rpm: config.get_rpm,
            window: Duration::from_secs(config.window_secs),
        }
    }

    fn limit_for(&self, class: MethodClass) -> u32 {
        match class {
            MethodClass::Post => self.post_rpm,
            MethodClass::Get => self.get_rpm,
        }
    }

    pub async fn check(&self, class: MethodClass, identity: &str) -> RateLimitDecision {
        let limit = self.limit_for(class);
        let window_ms = self.window.as_millis() as u64;

        if !self.enabled {
            return RateLimitDecision {
                allowed: true,
                limit,
                remaining: limit,
                reset_at_ms: now_ms() + window_ms,
            };
        }

        match self.check_window(class, identity, limit, window_ms).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(error = %e, "Rate limit check failed, allowing request");
                RateLimitDecision {
                    allowed: true,
                    limit,
                    remaining: limit.saturating_sub(1),
                    reset_at_ms: now_ms() + window_ms,
                }
            }
        }
    }

    async fn check_window(
        &self,
        class: MethodClass,
        identity: &str,
        limit: u32,
        window_ms: u64,
    ) -> Result<RateLimitDecision, StoreError> {
        let key = format!("{RATE_LIMIT_PREFIX}{}:{identity}", class.as_str());
        let now = now_ms();

        let mut hits: Vec<u64> = match self.store.get(&key).await? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            None => Vec::new(),
        };
        hits.retain(|&t| now.saturating_sub(t) < window_ms);

        let reset_at_ms = hits.first().map_or(now + window_ms, |&oldest| oldest + window_ms);

        if hits.len() as u32 >= limit {
            return Ok(RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at_ms,
            });
        }

        hits.push(now);
        let raw = serde_json::to_string(&hits).map_err(|e| StoreError::Decode {
            reason: e.to_string(),
        })?;
        self.store.put(&key, &raw, self.window).await?;

        Ok(RateLimitDecision {
            allowed: true,
            limit,
            remaining: limit - hits.len() as u32,
            reset_at_ms: hits.first().map_or(now + window_ms, |&oldest| oldest + window_ms),
        })
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
