//! TTL key/value storage behind a single port.
//!
//! Two backends live behind [`KvStore`]: a remote Upstash-style REST store
//! for deployments and an in-memory map for development and tests. The
//! backend is chosen once at startup and never changes.

mod memory;
mod remote;

pub use memory::MemoryStore;
pub use remote::RemoteStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::KvConfig;
use crate::error::StoreError;

pub const JOB_PREFIX: &str = "job:";
pub const CACHE_PREFIX: &str = "cache:";
pub const RATE_LIMIT_PREFIX: &str = "ratelimit:";

pub fn job_key(id: &str) -> String {
    format!("{JOB_PREFIX}{id}")
}

pub fn cache_key(fingerprint: &str) -> String {
    format!("{CACHE_PREFIX}{fingerprint}")
}

/// Uniform get/set/delete with TTL over opaque serialized records.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Admin-only; may be O(n) over the keyspace.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Which backend [`create_store`] selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Remote,
    Memory,
}

/// Select the store backend once at startup based on whether KV credentials
/// are present.
pub fn create_store(kv: Option<&KvConfig>) -> (Arc<dyn KvStore>, StoreBackend) {
    match kv {
        Some(config) => {
            tracing::info!("Using remote KV store");
            (
                Arc::new(RemoteStore::new(config.clone())),
                StoreBackend::Remote,
            )
        }
        None => {
            tracing::info!("KV credentials absent, using in-memory store");
            (Arc::new(MemoryStore::new()), StoreBackend::Memory)
        }
    }
}
