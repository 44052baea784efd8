//! Chat-completion boundary.
//!
//! One completion call per answered question. [`ChatModel`] is the seam the
//! answerer talks through; [`OpenAiChat`] calls the OpenAI chat completions
//! API at low temperature with a small output ceiling (the answers are meant
//! to be 2–3 sentences). Retry follows the same schedule as the embedding
//! boundary: 429/5xx/network back off exponentially, other 4xx fail fast.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::KbError;

/// A language model that completes a single prompt into answer text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, KbError>;
}

/// Chat backend using the OpenAI `POST /v1/chat/completions` endpoint.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiChat {
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    max_retries: u32,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig) -> Result<Self, KbError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| KbError::Chat("OPENAI_API_KEY environment variable not set".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            max_retries: config.max_retries,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, KbError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_output_tokens,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, ?delay, "retrying chat completion");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_completion_response(&json);
                    }

                    let text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(KbError::Chat(format!("API error {}: {}", status, text)));
                        continue;
                    }

                    return Err(KbError::Chat(format!("API error {}: {}", status, text)));
                }
                Err(e) => {
                    last_err = Some(KbError::Chat(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| KbError::Chat("retries exhausted".into())))
    }
}

/// Pull `choices[0].message.content` out of a chat completions response.
fn parse_completion_response(json: &serde_json::Value) -> Result<String, KbError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|choice| choice.pointer("/message/content"))
        .and_then(|content| content.as_str())
        .map(String::from)
        .ok_or_else(|| KbError::Chat("response missing message content".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion_response() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "Keep your back straight." } }
            ]
        });
        assert_eq!(
            parse_completion_response(&json).unwrap(),
            "Keep your back straight."
        );
    }

    #[test]
    fn test_parse_rejects_empty_choices() {
        let json = serde_json::json!({ "choices": [] });
        assert!(parse_completion_response(&json).is_err());
    }
}
