//! Speech synthesis — turns a script's message into prompt audio.

use async_trait::async_trait;
use secrecy::ExposeSecret;

use crate::config::SynthesisConfig;
use crate::error::SynthesisError;

const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io";

/// Produces MP3 audio for a piece of text.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Provider name for logs and errors.
    fn name(&self) -> &str;

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError>;
}

/// ElevenLabs text-to-speech.
pub struct ElevenLabsSynthesizer {
    config: SynthesisConfig,
    base_url: String,
    client: reqwest::Client,
}

impl ElevenLabsSynthesizer {
    pub fn new(config: SynthesisConfig) -> Self {
        Self::with_base_url(config, ELEVENLABS_API_BASE)
    }

    /// Point the synthesizer at another API host.
    pub fn with_base_url(config: SynthesisConfig, base_url: impl Into<String>) -> Self {
        Self {
            config,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self) -> String {
        format!("{}/v1/text-to-speech/{}", self.base_url, self.config.voice_id)
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "text": text,
            "model_id": self.config.model_id,
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.5
            }
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError> {
        let resp = self
            .client
            .post(self.api_url())
            .header("xi-api-key", self.config.api_key.expose_secret())
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&self.request_body(text))
            .send()
            .await
            .map_err(|e| SynthesisError::RequestFailed {
                provider: self.name().into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SynthesisError::Rejected {
                provider: self.name().into(),
                status: status.as_u16(),
                message,
            });
        }

        let audio = resp
            .bytes()
            .await
            .map_err(|e| SynthesisError::RequestFailed {
                provider: self.name().into(),
                reason: e.to_string(),
            })?;

        if audio.is_empty() {
            return Err(SynthesisError::EmptyAudio {
                provider: self.name().into(),
            });
        }

        tracing::info!(bytes = audio.len(), "Speech synthesized");
        Ok(audio.to_vec())
    }
}
