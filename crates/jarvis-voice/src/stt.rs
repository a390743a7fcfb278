//! Speech-to-text provider trait and the Whisper-compatible HTTP client.
//!
//! API keys are resolved from environment variables, never stored in config.

use std::time::Duration;

use async_trait::async_trait;

use jarvis_types::SttSettings;

use crate::{VoiceError, VoiceResult};

/// Pluggable speech-to-text backend.
///
/// An empty transcript means "no recognizable speech"; callers treat it the
/// same as silence. [`VoiceError::Timeout`] is likewise recoverable. Any other
/// error is a hard failure of the service.
#[async_trait]
pub trait SttProvider: Send + Sync {
    /// Transcribe WAV audio (16-bit PCM, mono).
    async fn transcribe(&self, audio: &[u8]) -> VoiceResult<String>;

    /// Provider name for logs.
    fn name(&self) -> &str;
}

/// OpenAI-compatible `/v1/audio/transcriptions` client.
pub struct WhisperStt {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    language: String,
}

impl WhisperStt {
    /// Build from settings, resolving the API key from the environment.
    pub fn from_settings(settings: &SttSettings) -> VoiceResult<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                VoiceError::ConfigError(format!(
                    "missing API key: environment variable {} is not set",
                    settings.api_key_env
                ))
            })?;
        Self::new(
            &settings.base_url,
            &api_key,
            &settings.model,
            &settings.language,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        language: &str,
        timeout: Duration,
    ) -> VoiceResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/v1/audio/transcriptions",
                base_url.trim_end_matches('/')
            ),
            api_key: api_key.to_string(),
            model: model.to_string(),
            language: language.to_string(),
        })
    }
}

#[async_trait]
impl SttProvider for WhisperStt {
    async fn transcribe(&self, audio: &[u8]) -> VoiceResult<String> {
        tracing::debug!(
            model = %self.model,
            audio_bytes = audio.len(),
            "sending audio for transcription"
        );

        let file = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("language", self.language.clone())
            .text("response_format", "text");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(timeout_or_http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::SttError(format!(
                "transcription service returned {status}: {}",
                body.trim()
            )));
        }

        let text = response.text().await.map_err(timeout_or_http)?;
        Ok(text.trim().to_string())
    }

    fn name(&self) -> &str {
        "whisper"
    }
}

fn timeout_or_http(e: reqwest::Error) -> VoiceError {
    if e.is_timeout() {
        VoiceError::Timeout
    } else {
        VoiceError::HttpError(e)
    }
}
