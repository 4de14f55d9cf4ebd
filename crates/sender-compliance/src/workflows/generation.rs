//! Text-generation collaborator used for use-case drafts and sample copy rewrites.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Prompt → completion black box. Implementations never retry; callers decide whether to re-run.
pub trait TextGenerator: Send + Sync {
    fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, GenerationError>;
}

/// Failure talking to, or interpreting, the text-generation service.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("text generation service unreachable: {0}")]
    Unreachable(String),
    #[error("text generation service returned status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("text generation returned an invalid response: {0}")]
    InvalidResponse(String),
    #[error("text generation returned an empty completion")]
    EmptyCompletion,
    #[error("text generation is not configured: {0}")]
    NotConfigured(String),
}

/// Sampling knobs passed on every completion request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: 400,
            temperature: 0.7,
        }
    }
}

/// Connection settings for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// Blocking HTTP client for the configured completions endpoint.
pub struct HttpTextGenerator {
    agent: ureq::Agent,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpTextGenerator {
    pub fn from_config(config: &GenerationConfig) -> Result<Self, GenerationError> {
        if config.endpoint.trim().is_empty() {
            return Err(GenerationError::NotConfigured(
                "GENERATION_ENDPOINT is empty".to_string(),
            ));
        }
        if config.timeout_ms == 0 {
            return Err(GenerationError::NotConfigured(
                "GENERATION_TIMEOUT_MS must be > 0".to_string(),
            ));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("sender-compliance/", env!("CARGO_PKG_VERSION")))
            .build();

        Ok(Self {
            agent,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn payload(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Value {
        json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": max_tokens,
            "temperature": temperature,
        })
    }
}

impl std::fmt::Debug for HttpTextGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTextGenerator")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl TextGenerator for HttpTextGenerator {
    fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        let mut request = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .set("Accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.set("Authorization", &format!("Bearer {key}"));
        }

        debug!(endpoint = %self.endpoint, model = %self.model, max_tokens, "requesting completion");
        let response = request
            .send_json(self.payload(prompt, max_tokens, temperature))
            .map_err(generation_error_from_ureq)?;
        let body: Value = response
            .into_json()
            .map_err(|err| GenerationError::InvalidResponse(err.to_string()))?;

        extract_completion(&body)
    }
}

fn generation_error_from_ureq(err: ureq::Error) -> GenerationError {
    match err {
        ureq::Error::Status(status, response) => GenerationError::Upstream {
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => GenerationError::Unreachable(transport.to_string()),
    }
}

/// Pull the first choice out of a chat- or text-completions response body.
pub(crate) fn extract_completion(body: &Value) -> Result<String, GenerationError> {
    let choice = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| GenerationError::InvalidResponse("response has no choices".to_string()))?;

    let text = choice
        .pointer("/message/content")
        .or_else(|| choice.get("text"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            GenerationError::InvalidResponse("first choice carries no text".to_string())
        })?;

    let text = text.trim();
    if text.is_empty() {
        return Err(GenerationError::EmptyCompletion);
    }
    Ok(text.to_string())
}
