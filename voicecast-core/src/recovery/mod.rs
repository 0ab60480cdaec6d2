//! Failure classification and recovery around synthesis and playback.
//!
//! Retryable synthesis failures walk a bounded ladder: fixed-delay retries,
//! then one attempt with the default voice profile, then one attempt with
//! truncated text. Connection failures trigger a reconnect to the same
//! channel. Every classified failure feeds per-guild statistics; enough
//! consecutive failures mark the guild unhealthy so callers can bail out.

use std::collections::HashMap;
use std::sync::RwLock;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::VoiceError;
use crate::events::{EventSender, PipelineEvent};
use crate::playback::PlaybackEngine;
use crate::settings::{PipelineSettings, SynthesisConfig};
use crate::tts::{AudioData, SpeechSynthesizer, SynthesisRequest};

/// A guild is unhealthy once its consecutive failures exceed this.
pub const CONSECUTIVE_FAILURE_THRESHOLD: u32 = 5;

/// Texts longer than this get one final truncated attempt.
pub const TRUNCATION_RETRY_THRESHOLD: usize = 100;

/// Rolling per-guild failure counters. Any success resets the consecutive
/// count; the named counters only ever grow.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorStats {
    pub voice_connection_errors: u64,
    pub tts_conversion_errors: u64,
    pub playback_errors: u64,
    pub consecutive_failures: u32,
}

impl ErrorStats {
    pub fn is_healthy(&self) -> bool {
        self.consecutive_failures <= CONSECUTIVE_FAILURE_THRESHOLD
    }
}

/// Which named counter a classified failure lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    VoiceConnection,
    TtsConversion,
    Playback,
}

impl ErrorCategory {
    pub fn counter_name(self) -> &'static str {
        match self {
            ErrorCategory::VoiceConnection => "voice_connection",
            ErrorCategory::TtsConversion => "tts_conversion",
            ErrorCategory::Playback => "playback",
        }
    }
}

pub struct ErrorRecovery {
    stats: RwLock<HashMap<String, ErrorStats>>,
    settings: PipelineSettings,
    events: EventSender,
}

impl ErrorRecovery {
    pub fn new(settings: PipelineSettings, events: EventSender) -> Self {
        Self {
            stats: RwLock::new(HashMap::new()),
            settings,
            events,
        }
    }

    /// Synthesizes with the full recovery ladder. Fatal classifications are
    /// surfaced immediately; retryable ones are retried with a fixed delay,
    /// then retried once on the default profile, then once with truncated
    /// text when the input is long. Exhaustion surfaces the last error.
    pub async fn synthesize_with_recovery(
        &self,
        synthesizer: &dyn SpeechSynthesizer,
        guild_id: &str,
        text: &str,
        config: &SynthesisConfig,
    ) -> Result<AudioData, VoiceError> {
        let request = SynthesisRequest::from_config(text, config);

        let mut last_error = match self.attempt_with_retries(synthesizer, guild_id, request).await {
            Ok(audio) => {
                self.record_success(guild_id);
                return Ok(audio);
            }
            Err(e) if e.is_retryable() => e,
            Err(e) => {
                self.record_failure(guild_id, ErrorCategory::TtsConversion);
                return Err(e);
            }
        };

        // Fall back to the guild's default voice profile
        info!(guild_id, "retrying synthesis with the default voice profile");
        let fallback = SynthesisRequest::from_config(text, &SynthesisConfig::default());
        match synthesizer.synthesize(&fallback).await {
            Ok(audio) => {
                self.record_success(guild_id);
                return Ok(audio);
            }
            Err(e) if e.is_retryable() => last_error = e,
            Err(e) => {
                self.record_failure(guild_id, ErrorCategory::TtsConversion);
                return Err(e);
            }
        }

        // Long inputs get one more chance at a length the provider may accept
        if text.chars().count() > TRUNCATION_RETRY_THRESHOLD {
            let truncated = truncate_with_ellipsis(text, TRUNCATION_RETRY_THRESHOLD);
            info!(
                guild_id,
                chars = truncated.chars().count(),
                "retrying synthesis with truncated text"
            );
            let request = SynthesisRequest::from_config(truncated, &SynthesisConfig::default());
            match synthesizer.synthesize(&request).await {
                Ok(audio) => {
                    self.record_success(guild_id);
                    return Ok(audio);
                }
                Err(e) => last_error = e,
            }
        }

        self.record_failure(guild_id, ErrorCategory::TtsConversion);
        Err(last_error)
    }

    async fn attempt_with_retries(
        &self,
        synthesizer: &dyn SpeechSynthesizer,
        guild_id: &str,
        request: SynthesisRequest,
    ) -> Result<AudioData, VoiceError> {
        let max_retries = self.settings.max_retries;
        let mut attempt = 0u32;

        loop {
            match synthesizer.synthesize(&request).await {
                Ok(audio) => return Ok(audio),
                Err(error) if error.is_retryable() && attempt < max_retries => {
                    let delay = self.settings.retry_delay;
                    warn!(
                        guild_id,
                        attempt = attempt + 1,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "synthesis failed, retrying after delay"
                    );
                    self.events.send(PipelineEvent::RetryAttempt {
                        guild_id: guild_id.to_string(),
                        attempt: attempt + 1,
                        max_retries,
                        error: error.to_string(),
                        delay_ms: delay.as_millis() as u64,
                    });
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Tears down the guild's attachment and rejoins the same channel.
    /// Failures are surfaced to the caller but must never crash the loop.
    pub async fn reconnect(
        &self,
        playback: &PlaybackEngine,
        guild_id: &str,
    ) -> Result<(), VoiceError> {
        let Some(channel_id) = playback.connected_channel(guild_id) else {
            return Err(VoiceError::ConnectionLost(format!(
                "guild {guild_id} has no channel to reconnect to"
            )));
        };

        info!(guild_id, channel_id = %channel_id, "reconnecting voice session");
        playback.disconnect(guild_id).await?;
        match playback.connect(guild_id, &channel_id).await {
            Ok(()) => {
                self.record_success(guild_id);
                Ok(())
            }
            Err(e) => {
                self.record_failure(guild_id, ErrorCategory::VoiceConnection);
                Err(e)
            }
        }
    }

    pub fn record_failure(&self, guild_id: &str, category: ErrorCategory) {
        let mut stats = self.stats.write().unwrap();
        let entry = stats.entry(guild_id.to_string()).or_default();
        match category {
            ErrorCategory::VoiceConnection => entry.voice_connection_errors += 1,
            ErrorCategory::TtsConversion => entry.tts_conversion_errors += 1,
            ErrorCategory::Playback => entry.playback_errors += 1,
        }
        entry.consecutive_failures += 1;

        warn!(
            guild_id,
            counter = category.counter_name(),
            consecutive = entry.consecutive_failures,
            "recorded pipeline failure"
        );

        // Announce the health transition exactly once per degradation
        if entry.consecutive_failures == CONSECUTIVE_FAILURE_THRESHOLD + 1 {
            self.events.send(PipelineEvent::GuildUnhealthy {
                guild_id: guild_id.to_string(),
                consecutive_failures: entry.consecutive_failures,
            });
        }
    }

    pub fn record_success(&self, guild_id: &str) {
        let mut stats = self.stats.write().unwrap();
        let entry = stats.entry(guild_id.to_string()).or_default();
        entry.consecutive_failures = 0;
    }

    pub fn error_stats(&self, guild_id: &str) -> ErrorStats {
        self.stats
            .read()
            .unwrap()
            .get(guild_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn is_guild_healthy(&self, guild_id: &str) -> bool {
        self.error_stats(guild_id).is_healthy()
    }

    pub fn clear_stats(&self, guild_id: &str) {
        self.stats.write().unwrap().remove(guild_id);
    }
}

/// Fixed user-facing copy per error category. This is a literal lookup; the
/// exact sentences are load-bearing for front ends that match on them.
pub fn user_friendly_message(error: &VoiceError) -> &'static str {
    match error {
        VoiceError::ConnectionLost(_) | VoiceError::PlaybackTimeout(_) => {
            "I lost the voice connection. I will try to rejoin the channel."
        }
        VoiceError::PermissionDenied(_) => {
            "I don't have permission to speak in that voice channel."
        }
        VoiceError::SynthesisRetryable(_)
        | VoiceError::SynthesisFatal(_)
        | VoiceError::Codec(_) => "I couldn't convert that message to speech. Skipping it.",
        _ => "Something went wrong while reading messages. Skipping to the next one.",
    }
}

/// Truncates to at most `max_chars` characters, ellipsis included, cutting
/// on character boundaries.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str("...");
    truncated
}
