//! Gemini summarizer adapter.
//!
//! Uses the Google AI Studio OpenAI-compatible chat completions surface with
//! API key authentication and a JSON-only instruction; the model's reply is
//! parsed as the strict summary payload.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::{KeyPointBounds, SummaryLengths};
use crate::error::SummarizerError;
use crate::job::{SummaryFormat, SummaryLength};

use super::{Summarizer, SummaryDraft, endpoint, http_client};

pub struct GeminiSummarizer {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    lengths: SummaryLengths,
    key_points: KeyPointBounds,
}

impl GeminiSummarizer {
    pub fn new(
        base_url: String,
        api_key: SecretString,
        model: String,
        lengths: SummaryLengths,
        key_points: KeyPointBounds,
    ) -> Self {
        Self {
            client: http_client(Duration::from_secs(120)),
            base_url,
            api_key,
            model,
            lengths,
            key_points,
        }
    }

    fn build_instructions(&self, length: SummaryLength, format: SummaryFormat) -> String {
        let window = self.lengths.window(length);
        let format_rule = match format {
            SummaryFormat::Bullets => {
                "Write the summary as terse bullet lines, one per line, each starting with '- '."
            }
            SummaryFormat::Paragraph => "Write the summary as flowing prose paragraphs.",
        };
        format!(
            "You summarize video transcripts. Respond with a single JSON object and \
             nothing else, shaped as {{\"summary\": string, \"keyPoints\": [string], \
             \"confidence\": integer}}. The summary must run {} to {} characters. {} \
             Provide {} to {} key points, each one sentence. confidence is an integer \
             from 0 to 100 expressing how well the transcript supports the summary.",
            window.min_chars, window.max_chars, format_rule, self.key_points.min, self.key_points.max
        )
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(
        &self,
        text: &str,
        length: SummaryLength,
        format: SummaryFormat,
    ) -> Result<SummaryDraft, SummarizerError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatCompletionMessage {
                    role: "system",
                    content: self.build_instructions(length, format),
                },
                ChatCompletionMessage {
                    role: "user",
                    content: text.to_string(),
                },
            ],
            temperature: Some(0.2),
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        tracing::debug!(model = %self.model, input_chars = text.len(), "Summarizer call");

        let response = self
            .client
            .post(endpoint(&self.base_url, &["chat", "completions"]))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| SummarizerError::Upstream {
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status, "Summarizer response");

        let parsed: ChatCompletionResponse = match status {
            200..=299 => {
                serde_json::from_str(&body).map_err(|e| SummarizerError::InvalidResponse {
                    reason: format!("unparseable completion envelope: {e}"),
                })?
            }
            401 | 403 => return Err(SummarizerError::Auth),
            429 => return Err(SummarizerError::Quota),
            _ => {
                return Err(SummarizerError::Upstream {
                    reason: format!("summarizer answered {status}: {body}"),
                });
            }
        };

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        let payload = strip_code_fence(&content);

        serde_json::from_str(payload).map_err(|e| SummarizerError::InvalidResponse {
            reason: format!("payload is not the expected JSON: {e}"),
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Models occasionally fence the payload even in JSON mode; peel one layer of
/// ``` markers if present.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

// OpenAI-compatible chat completions wire types.

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatCompletionMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatCompletionMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponseMessage {
    content: Option<String>,
}
