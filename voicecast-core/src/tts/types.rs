use serde::{Deserialize, Serialize};

use crate::settings::SynthesisConfig;

/// Linear PCM returned from synthesis: interleaved i16 little-endian samples.
#[derive(Debug, Clone)]
pub struct AudioData {
    pub pcm_data: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Voice configuration for synthesis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
    pub name: String,
    pub language_code: String,
}

/// One synthesis call: the text plus the voice parameters the provider
/// understands. Volume is applied later by the transcoder, so it does not
/// appear here.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
    pub speed: f32,
}

impl SynthesisRequest {
    pub fn from_config(text: impl Into<String>, config: &SynthesisConfig) -> Self {
        Self {
            text: text.into(),
            voice: config.voice.clone(),
            speed: config.speed,
        }
    }
}
