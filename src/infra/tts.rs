use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

use crate::config::AppConfig;

/// Seam over the third-party voice provider. The API and the sample batch
/// only ever see this trait; tests substitute a scripted implementation.
#[async_trait]
pub trait TtsClient: Send + Sync {
    /// Synthesize `text` with the given provider voice, returning MP3 bytes.
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Bytes>;
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

/// ElevenLabs REST client. One POST per synthesis, MP3 back in the body.
pub struct ElevenLabsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ElevenLabsClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.tts_base_url.trim_end_matches('/').to_string(),
            api_key: config.tts_api_key.clone(),
        }
    }
}

#[async_trait]
impl TtsClient for ElevenLabsClient {
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Bytes> {
        if self.api_key.is_empty() {
            return Err(anyhow!("missing TTS API key"));
        }

        let body = SynthesisRequest {
            text,
            model_id: "eleven_monolingual_v1",
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.75,
            },
        };

        let response = self
            .http
            .post(format!("{}/v1/text-to-speech/{}", self.base_url, voice_id))
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("provider returned {}: {}", status, detail));
        }

        Ok(response.bytes().await?)
    }
}
