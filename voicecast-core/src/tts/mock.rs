use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use super::provider::SpeechSynthesizer;
use super::types::{AudioData, SynthesisRequest, Voice};
use crate::error::VoiceError;

/// Mock behavior for the mock synthesizer
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MockBehavior {
    /// Return successful synthesis
    #[default]
    Success,
    /// Return a retryable error N times, then succeed
    RetryableErrorThenSuccess { remaining_errors: usize },
    /// Always return a retryable error
    AlwaysRetryableError,
    /// Always return a fatal error
    AlwaysFatalError,
    /// Retryable failure unless the requested voice matches
    SucceedOnlyForVoice { voice: String },
    /// Retryable failure unless the text is at most this many characters
    SucceedOnlyForShortText { max_chars: usize },
}

/// Mock synthesis provider for testing. Returns a short constant-valued PCM
/// clip so transcoding stays fast and assertable.
#[derive(Clone)]
pub struct MockSynthesizer {
    behavior: Arc<Mutex<MockBehavior>>,
    call_count: Arc<Mutex<usize>>,
    captured_requests: Arc<Mutex<Vec<SynthesisRequest>>>,
    sample_rate: u32,
    channels: u16,
    sample_value: i16,
    sample_frames: usize,
}

impl MockSynthesizer {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            call_count: Arc::new(Mutex::new(0)),
            captured_requests: Arc::new(Mutex::new(Vec::new())),
            sample_rate: 24000,
            channels: 1,
            sample_value: 1000,
            sample_frames: 480,
        }
    }

    /// Override the PCM clip returned on success.
    pub fn with_audio(mut self, sample_rate: u32, channels: u16, frames: usize) -> Self {
        self.sample_rate = sample_rate;
        self.channels = channels;
        self.sample_frames = frames;
        self
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn captured_requests(&self) -> Vec<SynthesisRequest> {
        self.captured_requests.lock().unwrap().clone()
    }

    fn success_audio(&self) -> AudioData {
        let sample_count = self.sample_frames * self.channels as usize;
        let mut pcm_data = Vec::with_capacity(sample_count * 2);
        for _ in 0..sample_count {
            pcm_data.extend_from_slice(&self.sample_value.to_le_bytes());
        }
        AudioData {
            pcm_data,
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn default_voice(&self) -> Voice {
        Voice {
            id: "mock-voice".to_string(),
            name: "Mock".to_string(),
            language_code: "en".to_string(),
        }
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioData, VoiceError> {
        *self.call_count.lock().unwrap() += 1;
        self.captured_requests.lock().unwrap().push(request.clone());

        let mut behavior = self.behavior.lock().unwrap();
        match &mut *behavior {
            MockBehavior::Success => Ok(self.success_audio()),
            MockBehavior::RetryableErrorThenSuccess { remaining_errors } => {
                if *remaining_errors > 0 {
                    *remaining_errors -= 1;
                    Err(VoiceError::SynthesisRetryable(anyhow!(
                        "mock retryable error"
                    )))
                } else {
                    Ok(self.success_audio())
                }
            }
            MockBehavior::AlwaysRetryableError => Err(VoiceError::SynthesisRetryable(anyhow!(
                "mock retryable error"
            ))),
            MockBehavior::AlwaysFatalError => {
                Err(VoiceError::SynthesisFatal(anyhow!("mock fatal error")))
            }
            MockBehavior::SucceedOnlyForVoice { voice } => {
                if request.voice == *voice {
                    Ok(self.success_audio())
                } else {
                    Err(VoiceError::SynthesisRetryable(anyhow!(
                        "mock rejects voice {}",
                        request.voice
                    )))
                }
            }
            MockBehavior::SucceedOnlyForShortText { max_chars } => {
                if request.text.chars().count() <= *max_chars {
                    Ok(self.success_audio())
                } else {
                    Err(VoiceError::SynthesisRetryable(anyhow!(
                        "mock rejects long text ({} chars)",
                        request.text.chars().count()
                    )))
                }
            }
        }
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, VoiceError> {
        Ok(vec![self.default_voice()])
    }
}
