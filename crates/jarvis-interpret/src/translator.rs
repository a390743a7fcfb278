//! Translation service trait and the OpenAI-compatible implementation.

use std::time::Duration;

use async_trait::async_trait;

use jarvis_types::InterpreterConfig;

use crate::{InterpretError, InterpretResult};

// ---------------------------------------------------------------------------
// Translator trait
// ---------------------------------------------------------------------------

/// External service turning a request into a candidate command.
///
/// The reply is untrusted text; callers clean and re-validate it.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, system_prompt: &str, request: &str) -> InterpretResult<String>;

    /// Provider name for logs.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// OpenAI Chat Completions
// ---------------------------------------------------------------------------

/// Calls `{base_url}/v1/chat/completions` and returns
/// `choices[0].message.content`.
pub struct OpenAiTranslator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiTranslator {
    /// Build from configuration, reading the API key from the environment.
    ///
    /// A missing key is not an error here; every call then fails with
    /// [`InterpretError::MissingApiKey`] and the caller falls back.
    pub fn from_config(config: &InterpreterConfig) -> InterpretResult<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::debug!(
                env = %config.api_key_env,
                "no translation API key, local fallback only"
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Create from explicit parameters (useful for testing).
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Self {
        let defaults = InterpreterConfig::default();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: Some(api_key.to_string()),
            api_key_env: defaults.api_key_env,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
        }
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(&self, system_prompt: &str, request: &str) -> InterpretResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| InterpretError::MissingApiKey(self.api_key_env.clone()))?;

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": request },
            ],
        });

        let url = format!("{}/v1/chat/completions", self.base_url);
        tracing::debug!(model = %self.model, %url, "requesting command translation");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(InterpretError::Service {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| InterpretError::BadResponse(format!("invalid JSON: {e}")))?;

        parsed["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| InterpretError::BadResponse(format!("unexpected response shape: {text}")))
    }

    fn name(&self) -> &str {
        "openai"
    }
}
