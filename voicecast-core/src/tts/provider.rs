use async_trait::async_trait;

use super::types::{AudioData, SynthesisRequest, Voice};
use crate::error::VoiceError;

/// Trait for speech synthesis providers.
///
/// Implementations classify their own failures: transient provider or
/// network conditions come back as `VoiceError::SynthesisRetryable`,
/// permanent ones (rejected input, bad credentials) as
/// `VoiceError::SynthesisFatal`. The recovery ladder relies on that tag.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Get the voice used when a guild has not picked one
    fn default_voice(&self) -> Voice;

    /// Synthesize text to linear PCM
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioData, VoiceError>;

    /// List available voices
    async fn list_voices(&self) -> Result<Vec<Voice>, VoiceError>;
}
