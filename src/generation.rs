//! Generation provider abstraction and implementations.
//!
//! Defines the [`GenerationProvider`] trait and the OpenAI-compatible chat
//! completions implementation. Like embeddings, providers are injected at
//! construction and calls are single-attempt; failures surface as
//! [`Error::Generation`].

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::error::Error;
use crate::models::ChatTurn;

/// Prompt-to-text provider boundary. `system` carries the instruction (and
/// any context block); `turns` carry the conversation in order, ending with
/// the current user input.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Model identifier (e.g. `"gpt-4o"`).
    fn model_name(&self) -> &str;
    /// Generate a completion for the given system instruction and turns.
    async fn generate(&self, system: &str, turns: &[ChatTurn]) -> Result<String, Error>;
}

/// Generation provider calling an OpenAI-compatible `/v1/chat/completions`
/// endpoint.
pub struct OpenAiChat {
    model: String,
    temperature: f32,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            temperature: config.temperature,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl GenerationProvider for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system: &str, turns: &[ChatTurn]) -> Result<String, Error> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(serde_json::json!({"role": "system", "content": system}));
        for turn in turns {
            messages.push(serde_json::json!({
                "role": turn.role.as_str(),
                "content": turn.content,
            }));
        }

        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages,
        });

        tracing::debug!(model = %self.model, turns = turns.len(), "generation call");

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;
        parse_completion_response(&json)
    }
}

/// Extract `choices[0].message.content`.
fn parse_completion_response(json: &serde_json::Value) -> Result<String, Error> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::Generation("invalid response: missing message content".to_string()))
}

/// Create the configured [`GenerationProvider`].
pub fn create_provider(
    config: &GenerationConfig,
) -> Result<std::sync::Arc<dyn GenerationProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(std::sync::Arc::new(OpenAiChat::new(config)?)),
        "disabled" => anyhow::bail!(
            "Generation provider is disabled. Set [generation] provider in config."
        ),
        other => anyhow::bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_completion_extracts_content() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Paris."}}]
        });
        assert_eq!(parse_completion_response(&json).unwrap(), "Paris.");
    }

    #[test]
    fn parse_completion_rejects_missing_content() {
        let json = serde_json::json!({"choices": []});
        assert!(matches!(
            parse_completion_response(&json),
            Err(Error::Generation(_))
        ));
    }
}
