use async_trait::async_trait;
use std::sync::Arc;

use crate::error::VoiceError;

/// A live conduit into one guild's voice session.
///
/// The transport owns real-time pacing; callers only guarantee frames arrive
/// in order, one discrete codec frame per `send_frame` call.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// The voice channel this connection is attached to
    fn channel_id(&self) -> &str;

    /// Write one codec frame to the session
    async fn send_frame(&self, frame: &[u8]) -> Result<(), VoiceError>;

    /// Whether the underlying transport handle is still live
    fn is_alive(&self) -> bool;
}

/// Trait for streaming-transport backends.
///
/// Implementations join and leave voice channels; which backend a process
/// uses is chosen at construction time, not by runtime type inspection.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn join(
        &self,
        guild_id: &str,
        channel_id: &str,
    ) -> Result<Arc<dyn VoiceConnection>, VoiceError>;

    async fn leave(&self, guild_id: &str) -> Result<(), VoiceError>;
}
