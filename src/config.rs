//! Environment-driven service configuration.
//!
//! All knobs come from environment variables (a `.env` file is honored via
//! dotenvy in `main`). Parse failures are fatal at startup; missing provider
//! credentials are not; they surface on the first request as
//! `CONFIGURATION_ERROR` so the service can still boot in partial setups.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::job::SummaryLength;
use crate::validate::DEFAULT_ALLOWED_HOSTS;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub transcript: TranscriptConfig,
    pub summarizer: SummarizerConfig,
    pub kv: Option<KvConfig>,
    pub rate_limit: RateLimitConfig,
    pub ttl: TtlConfig,
    pub chunking: ChunkingConfig,
    pub summary_lengths: SummaryLengths,
    pub key_points: KeyPointBounds,
    pub allowed_hosts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct TranscriptConfig {
    /// Supadata API key. Absent ⇒ `CONFIGURATION_ERROR` on first request.
    pub api_key: Option<SecretString>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Gemini API key. Absent ⇒ `CONFIGURATION_ERROR` on first request.
    pub api_key: Option<SecretString>,
    pub base_url: String,
    /// Model id, echoed in every result.
    pub model: String,
}

/// Remote KV credentials. Absent entirely ⇒ the in-memory backend.
#[derive(Debug, Clone)]
pub struct KvConfig {
    pub url: String,
    pub token: SecretString,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub post_rpm: u32,
    pub get_rpm: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            post_rpm: 10,
            get_rpm: 120,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TtlConfig {
    pub job_secs: u64,
    pub cache_secs: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            job_secs: 7_200,
            cache_secs: 604_800,
        }
    }
}

/// Thresholds for the chunk-and-reduce engine.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// Transcripts at or under this size go to the summarizer in one call.
    pub transcript_max_chars: usize,
    pub chunk_min_chars: usize,
    pub chunk_max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            transcript_max_chars: 120_000,
            chunk_min_chars: 24_000,
            chunk_max_chars: 48_000,
        }
    }
}

/// Accepted character range for a summary at one length setting.
#[derive(Debug, Clone, Copy)]
pub struct LengthWindow {
    pub min_chars: usize,
    pub max_chars: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SummaryLengths {
    pub short: LengthWindow,
    pub standard: LengthWindow,
    pub detailed: LengthWindow,
}

impl SummaryLengths {
    pub fn window(&self, length: SummaryLength) -> LengthWindow {
        match length {
            SummaryLength::Short => self.short,
            SummaryLength::Standard => self.standard,
            SummaryLength::Detailed => self.detailed,
        }
    }
}

impl Default for SummaryLengths {
    fn default() -> Self {
        Self {
            short: LengthWindow {
                min_chars: 80,
                max_chars: 1_200,
            },
            standard: LengthWindow {
                min_chars: 200,
                max_chars: 3_000,
            },
            detailed: LengthWindow {
                min_chars: 500,
                max_chars: 7_000,
            },
        }
    }
}

/// Bounds enforced on the number of key points a summary carries.
#[derive(Debug, Clone, Copy)]
pub struct KeyPointBounds {
    pub min: usize,
    pub max: usize,
}

impl Default for KeyPointBounds {
    fn default() -> Self {
        Self { min: 5, max: 9 }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let chunking = ChunkingConfig {
            transcript_max_chars: env_parse(
                "TRANSCRIPT_MAX_CHARS",
                ChunkingConfig::default().transcript_max_chars,
            )?,
            chunk_min_chars: env_parse("CHUNK_MIN_CHARS", ChunkingConfig::default().chunk_min_chars)?,
            chunk_max_chars: env_parse("CHUNK_MAX_CHARS", ChunkingConfig::default().chunk_max_chars)?,
        };

        let lengths = SummaryLengths {
            short: LengthWindow {
                min_chars: env_parse(
                    "SUMMARY_SHORT_MIN_CHARS",
                    SummaryLengths::default().short.min_chars,
                )?,
                max_chars: env_parse(
                    "SUMMARY_SHORT_MAX_CHARS",
                    SummaryLengths::default().short.max_chars,
                )?,
            },
            standard: LengthWindow {
                min_chars: env_parse(
                    "SUMMARY_STANDARD_MIN_CHARS",
                    SummaryLengths::default().standard.min_chars,
                )?,
                max_chars: env_parse(
                    "SUMMARY_STANDARD_MAX_CHARS",
                    SummaryLengths::default().standard.max_chars,
                )?,
            },
            detailed: LengthWindow {
                min_chars: env_parse(
                    "SUMMARY_DETAILED_MIN_CHARS",
                    SummaryLengths::default().detailed.min_chars,
                )?,
                max_chars: env_parse(
                    "SUMMARY_DETAILED_MAX_CHARS",
                    SummaryLengths::default().detailed.max_chars,
                )?,
            },
        };

        let config = Self {
            server: ServerConfig {
                host: env_or("HOST", "127.0.0.1"),
                port: env_parse("PORT", 8080)?,
            },
            transcript: TranscriptConfig {
                api_key: env_secret("SUPADATA_API_KEY"),
                base_url: env_or("SUPADATA_BASE_URL", "https://api.supadata.ai/v1"),
            },
            summarizer: SummarizerConfig {
                api_key: env_secret("GEMINI_API_KEY"),
                base_url: env_or(
                    "GEMINI_BASE_URL",
                    "https://generativelanguage.googleapis.com/v1beta/openai",
                ),
                model: env_or("GEMINI_MODEL", "gemini-2.0-flash"),
            },
            kv: match (env_opt("KV_REST_API_URL"), env_opt("KV_REST_API_TOKEN")) {
                (Some(url), Some(token)) => Some(KvConfig {
                    url,
                    token: SecretString::from(token),
                }),
                _ => None,
            },
            rate_limit: RateLimitConfig {
                enabled: env_parse("RATE_LIMIT_ENABLED", RateLimitConfig::default().enabled)?,
                post_rpm: env_parse("RATE_LIMIT_POST_RPM", RateLimitConfig::default().post_rpm)?,
                get_rpm: env_parse("RATE_LIMIT_GET_RPM", RateLimitConfig::default().get_rpm)?,
                window_secs: RateLimitConfig::default().window_secs,
            },
            ttl: TtlConfig {
                job_secs: env_parse("JOB_TTL_SECS", TtlConfig::default().job_secs)?,
                cache_secs: env_parse("CACHE_TTL_SECS", TtlConfig::default().cache_secs)?,
            },
            chunking,
            summary_lengths: lengths,
            key_points: KeyPointBounds {
                min: env_parse("KEY_POINTS_MIN", KeyPointBounds::default().min)?,
                max: env_parse("KEY_POINTS_MAX", KeyPointBounds::default().max)?,
            },
            allowed_hosts: env_opt("ALLOWED_HOSTS")
                .map(|raw| {
                    raw.split(',')
                        .map(|h| h.trim().to_ascii_lowercase())
                        .filter(|h| !h.is_empty())
                        .collect()
                })
                .unwrap_or_else(|| DEFAULT_ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect()),
        };

        config.check()?;
        Ok(config)
    }

    /// Cross-field sanity checks, run once at startup.
    fn check(&self) -> Result<(), ConfigError> {
        if self.chunking.chunk_min_chars > self.chunking.chunk_max_chars {
            return Err(ConfigError::Invalid {
                key: "CHUNK_MIN_CHARS",
                reason: "must not exceed CHUNK_MAX_CHARS".to_string(),
            });
        }
        if self.key_points.min > self.key_points.max {
            return Err(ConfigError::Invalid {
                key: "KEY_POINTS_MIN",
                reason: "must not exceed KEY_POINTS_MAX".to_string(),
            });
        }
        for (key, window) in [
            ("SUMMARY_SHORT_MIN_CHARS", self.summary_lengths.short),
            ("SUMMARY_STANDARD_MIN_CHARS", self.summary_lengths.standard),
            ("SUMMARY_DETAILED_MIN_CHARS", self.summary_lengths.detailed),
        ] {
            if window.min_chars > window.max_chars {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "window minimum exceeds maximum".to_string(),
                });
            }
        }
        if self.allowed_hosts.is_empty() {
            return Err(ConfigError::Invalid {
                key: "ALLOWED_HOSTS",
                reason: "allowlist must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_secret(key: &str) -> Option<SecretString> {
    env_opt(key).map(SecretString::from)
}

fn env_parse<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env_opt(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
    }
}
