use crate::error::VoiceError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MIN_SPEED: f32 = 0.25;
pub const MAX_SPEED: f32 = 4.0;
pub const MIN_VOLUME: f32 = 0.0;
pub const MAX_VOLUME: f32 = 2.0;

pub const DEFAULT_SPEED: f32 = 1.0;
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Voice id handed to the synthesis provider when a guild has not picked one.
/// Providers resolve "default" to their own built-in voice.
pub const DEFAULT_VOICE: &str = "default";

/// How transcoded audio is packaged before it is handed to playback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Opus packets concatenated with no delimiters. Reading this back relies
    /// on a best-effort boundary heuristic; prefer `Framed` when the frames
    /// must survive a round trip.
    Raw,
    /// Opus packets, each preceded by its byte length as a u16 little-endian
    /// prefix. The only format with reliable framing.
    #[default]
    Framed,
    /// 48 kHz stereo interleaved i16 little-endian PCM, unencoded.
    Pcm,
}

/// Per-guild voice parameters. Validated on every write; out-of-range values
/// are rejected rather than clamped (see `sanitized` for the one exception).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynthesisConfig {
    pub voice: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_speed() -> f32 {
    DEFAULT_SPEED
}

fn default_volume() -> f32 {
    DEFAULT_VOLUME
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            voice: DEFAULT_VOICE.to_string(),
            speed: DEFAULT_SPEED,
            volume: DEFAULT_VOLUME,
            format: OutputFormat::default(),
        }
    }
}

impl SynthesisConfig {
    pub fn validate(&self) -> Result<(), VoiceError> {
        if self.voice.trim().is_empty() {
            return Err(VoiceError::InvalidInput(
                "voice id must not be empty".to_string(),
            ));
        }
        if !(MIN_SPEED..=MAX_SPEED).contains(&self.speed) {
            return Err(VoiceError::InvalidInput(format!(
                "speed {} out of range [{MIN_SPEED}, {MAX_SPEED}]",
                self.speed
            )));
        }
        if !(MIN_VOLUME..=MAX_VOLUME).contains(&self.volume) {
            return Err(VoiceError::InvalidInput(format!(
                "volume {} out of range [{MIN_VOLUME}, {MAX_VOLUME}]",
                self.volume
            )));
        }
        Ok(())
    }

    /// Substitutes defaults for out-of-range fields instead of failing.
    /// Used when loading configs written before range validation existed.
    pub fn sanitized(mut self) -> Self {
        if self.voice.trim().is_empty() {
            self.voice = DEFAULT_VOICE.to_string();
        }
        if !(MIN_SPEED..=MAX_SPEED).contains(&self.speed) {
            self.speed = DEFAULT_SPEED;
        }
        if !(MIN_VOLUME..=MAX_VOLUME).contains(&self.volume) {
            self.volume = DEFAULT_VOLUME;
        }
        self
    }
}

/// Tunables for the whole pipeline. One instance per process, cloned into the
/// components that need it. The excluded persistence layer is responsible for
/// loading and storing these; here they are plain serde types with defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineSettings {
    /// Default per-guild queue capacity.
    pub queue_capacity: usize,
    /// Spoken text longer than this is truncated with a trailing ellipsis.
    pub max_spoken_chars: usize,
    /// Retries (beyond the first attempt) for retryable synthesis failures.
    pub max_retries: u32,
    /// How often the scheduler scans guilds for work.
    pub tick_interval: Duration,
    /// Quiet period after which the idle notice is spoken once.
    pub inactivity_threshold: Duration,
    /// Delay between synthesis retry attempts.
    pub retry_delay: Duration,
    /// Deadline for writing a single codec frame to the transport.
    pub frame_write_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 10,
            max_spoken_chars: 2000,
            max_retries: 3,
            tick_interval: Duration::from_millis(500),
            inactivity_threshold: Duration::from_secs(300),
            retry_delay: Duration::from_secs(2),
            frame_write_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SynthesisConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_speed() {
        let config = SynthesisConfig {
            speed: 5.0,
            ..SynthesisConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(VoiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn validate_rejects_negative_volume() {
        let config = SynthesisConfig {
            volume: -0.1,
            ..SynthesisConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(VoiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn validate_rejects_empty_voice() {
        let config = SynthesisConfig {
            voice: "  ".to_string(),
            ..SynthesisConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(VoiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn sanitized_substitutes_defaults_for_legacy_values() {
        let config = SynthesisConfig {
            voice: "".to_string(),
            speed: 9.0,
            volume: -1.0,
            format: OutputFormat::Pcm,
        }
        .sanitized();

        assert_eq!(config.voice, DEFAULT_VOICE);
        assert_eq!(config.speed, DEFAULT_SPEED);
        assert_eq!(config.volume, DEFAULT_VOLUME);
        // In-range fields pass through untouched
        assert_eq!(config.format, OutputFormat::Pcm);
    }

    #[test]
    fn sanitized_keeps_valid_values() {
        let config = SynthesisConfig {
            voice: "nova".to_string(),
            speed: 1.5,
            volume: 0.5,
            format: OutputFormat::Raw,
        };
        assert_eq!(config.clone().sanitized(), config);
    }

    #[test]
    fn settings_round_trip_through_toml() {
        let settings = PipelineSettings::default();
        let serialized = toml::to_string(&settings).unwrap();
        let parsed: PipelineSettings = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, settings);
    }
}
