//! ElevenLabs text-to-speech implementation

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::provider::SpeechSynthesizer;
use super::types::{AudioData, SynthesisRequest, Voice};
use crate::error::VoiceError;
use crate::settings::config::DEFAULT_VOICE;

#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
}

impl ElevenLabsConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
        }
    }
}

pub struct ElevenLabs {
    config: ElevenLabsConfig,
    client: Client,
}

impl ElevenLabs {
    pub fn new(config: ElevenLabsConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn resolve_voice_id<'a>(&'a self, requested: &'a str) -> &'a str {
        if requested.is_empty() || requested == DEFAULT_VOICE {
            &self.config.voice_id
        } else {
            requested
        }
    }
}

#[derive(Serialize)]
struct SynthesizeBody {
    text: String,
    model_id: String,
    voice_settings: VoiceSettings,
}

#[derive(Serialize)]
struct VoiceSettings {
    speed: f32,
}

#[derive(Deserialize)]
struct VoicesResponse {
    voices: Vec<VoiceData>,
}

#[derive(Deserialize)]
struct VoiceData {
    voice_id: String,
    name: String,
}

/// Transient statuses (throttling, server trouble) are worth retrying;
/// everything else means the request itself is bad.
fn classify_status(status: StatusCode, body: String) -> VoiceError {
    let err = anyhow!("ElevenLabs API error {status}: {body}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        VoiceError::SynthesisRetryable(err)
    } else {
        VoiceError::SynthesisFatal(err)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabs {
    fn name(&self) -> &'static str {
        "elevenlabs"
    }

    fn default_voice(&self) -> Voice {
        Voice {
            id: self.config.voice_id.clone(),
            name: "Default".to_string(),
            language_code: "en".to_string(),
        }
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioData, VoiceError> {
        let voice_id = self.resolve_voice_id(&request.voice);

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}/stream?output_format=pcm_16000",
            voice_id
        );

        let body = SynthesizeBody {
            text: request.text.clone(),
            model_id: self.config.model_id.clone(),
            voice_settings: VoiceSettings {
                speed: request.speed,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                VoiceError::SynthesisRetryable(
                    anyhow!(e).context("Failed to send request to ElevenLabs"),
                )
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read audio bytes")
            .map_err(VoiceError::SynthesisRetryable)?
            .to_vec();

        Ok(AudioData {
            pcm_data: bytes,
            sample_rate: 16000,
            channels: 1,
        })
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, VoiceError> {
        let response = self
            .client
            .get("https://api.elevenlabs.io/v1/voices")
            .header("xi-api-key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| {
                VoiceError::SynthesisRetryable(
                    anyhow!(e).context("Failed to list voices from ElevenLabs"),
                )
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let voices_response: VoicesResponse = response
            .json()
            .await
            .context("Failed to parse voices response")
            .map_err(VoiceError::SynthesisFatal)?;

        let voices = voices_response
            .voices
            .into_iter()
            .map(|v| Voice {
                id: v.voice_id,
                name: v.name,
                language_code: "en".to_string(),
            })
            .collect();

        Ok(voices)
    }
}
