//! Completed-summary cache keyed by request fingerprint.
//!
//! A fingerprint ties a normalized video URL to one canonical rendering of
//! the summary options, so clients that omit defaults still hit entries
//! produced by clients that spelled them out. Only completed results are
//! ever stored; failed and cancelled jobs never reach the cache.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StoreError;
use crate::job::{SummaryOptions, SummaryResult};
use crate::store::{KvStore, cache_key};

/// Stable hex fingerprint of `(normalized url, canonical options)`.
pub fn fingerprint(normalized_url: &str, options: &SummaryOptions) -> String {
    let digest = Sha256::digest(format!("{normalized_url}:{}", options.canonical()).as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_lang: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available_langs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub result: SummaryResult,
    pub meta: CacheMeta,
    pub created_at: DateTime<Utc>,
}

/// TTL-bounded cache of completed summaries over the shared KV store.
#[derive(Clone)]
pub struct SummaryCache {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl SummaryCache {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn lookup(
        &self,
        normalized_url: &str,
        options: &SummaryOptions,
    ) -> Result<Option<CacheEntry>, StoreError> {
        let key = cache_key(&fingerprint(normalized_url, options));
        match self.store.get(&key).await? {
            None => Ok(None),
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(entry) => Ok(Some(entry)),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping undecodable cache entry");
                    let _ = self.store.delete(&key).await;
                    Ok(None)
                }
            },
        }
    }

    pub async fn store(
        &self,
        normalized_url: &str,
        options: &SummaryOptions,
        entry: &CacheEntry,
    ) -> Result<(), StoreError> {
        let raw = serde_json::to_string(entry).map_err(|e| StoreError::Decode {
            reason: e.to_string(),
        })?;
        self.store
            .put(&cache_key(&fingerprint(normalized_url, options)), &raw, self.ttl)
            .await
    }

    pub async fn invalidate(
        &self,
        normalized_url: &str,
        options: &SummaryOptions,
    ) -> Result<(), StoreError> {
        self.store
            .delete(&cache_key(&fingerprint(normalized_url, options)))
            .await
    }
}
