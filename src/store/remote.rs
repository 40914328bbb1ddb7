//! Upstash-style REST backend.
//!
//! The remote store speaks the single-command REST protocol: each operation
//! is one POST of a JSON command array to the base URL, authenticated with a
//! bearer token, answered with `{"result": …}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::KvConfig;
use crate::error::StoreError;

use super::KvStore;

pub struct RemoteStore {
    client: Client,
    config: KvConfig,
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    result: Value,
}

impl RemoteStore {
    pub fn new(config: KvConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self { client, config }
    }

    async fn command(&self, command: Value) -> Result<Value, StoreError> {
        let response = self
            .client
            .post(&self.config.url)
            .bearer_auth(self.config.token.expose_secret())
            .json(&command)
            .send()
            .await
            .map_err(|e| StoreError::Request {
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(StoreError::Request {
                reason: format!("HTTP {status}: {body}"),
            });
        }

        let parsed: CommandResponse =
            serde_json::from_str(&body).map_err(|e| StoreError::Decode {
                reason: e.to_string(),
            })?;
        Ok(parsed.result)
    }
}

#[async_trait]
impl KvStore for RemoteStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.command(json!(["SET", key, value, "EX", ttl.as_secs().max(1)]))
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.command(json!(["GET", key])).await? {
            Value::Null => Ok(None),
            Value::String(value) => Ok(Some(value)),
            other => Err(StoreError::Decode {
                reason: format!("unexpected GET result: {other}"),
            }),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.command(json!(["DEL", key])).await?;
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let result = self.command(json!(["KEYS", format!("{prefix}*")])).await?;
        serde_json::from_value(result).map_err(|e| StoreError::Decode {
            reason: e.to_string(),
        })
    }
}
