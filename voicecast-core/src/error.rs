use std::time::Duration;
use thiserror::Error;

/// Error taxonomy for the playback pipeline.
///
/// Classification drives recovery: only `SynthesisRetryable` is retried by
/// the recovery ladder, `ConnectionLost` triggers a reconnect, and everything
/// else is surfaced to the scheduler which drops the current utterance and
/// moves on. A single utterance's failure never stops a guild's loop.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("malformed audio container: {0}")]
    MalformedContainer(String),

    #[error("retryable synthesis error: {0}")]
    SynthesisRetryable(anyhow::Error),

    #[error("fatal synthesis error: {0}")]
    SynthesisFatal(anyhow::Error),

    #[error("frame write timed out after {0:?}")]
    PlaybackTimeout(Duration),

    #[error("voice connection lost: {0}")]
    ConnectionLost(String),

    #[error("missing permission: {0}")]
    PermissionDenied(String),

    #[error("codec error: {0}")]
    Codec(anyhow::Error),
}

impl VoiceError {
    /// Whether the synthesis retry ladder should attempt this error again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VoiceError::SynthesisRetryable(_))
    }
}
