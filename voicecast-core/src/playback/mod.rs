//! Frame delivery into live voice sessions.
//!
//! The engine owns one connection registry for all guilds. `play` breaks a
//! framed container into discrete codec frames and offers them to the
//! transport in order; the transport handles real-time pacing, this layer
//! only guarantees order, no skips, no duplicates, and a bounded wait per
//! frame write.

pub mod mock;
pub mod transport;

pub use transport::{VoiceConnection, VoiceTransport};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::audio::container;
use crate::error::VoiceError;
use crate::settings::PipelineSettings;

struct GuildPlayback {
    channel_id: String,
    connection: Arc<dyn VoiceConnection>,
    paused: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
}

pub struct PlaybackEngine {
    transport: Arc<dyn VoiceTransport>,
    connections: RwLock<HashMap<String, GuildPlayback>>,
    frame_write_timeout: Duration,
}

impl PlaybackEngine {
    pub fn new(transport: Arc<dyn VoiceTransport>, settings: &PipelineSettings) -> Self {
        Self {
            transport,
            connections: RwLock::new(HashMap::new()),
            frame_write_timeout: settings.frame_write_timeout,
        }
    }

    /// Attaches a guild to a voice channel. Reconnecting to the channel the
    /// guild is already attached to is a no-op; connecting to a different
    /// channel tears down the old attachment first.
    pub async fn connect(&self, guild_id: &str, channel_id: &str) -> Result<(), VoiceError> {
        if guild_id.is_empty() || channel_id.is_empty() {
            return Err(VoiceError::InvalidInput(
                "guild id and channel id must not be empty".to_string(),
            ));
        }

        let existing_channel = {
            let connections = self.connections.read().unwrap();
            connections.get(guild_id).and_then(|entry| {
                entry
                    .connection
                    .is_alive()
                    .then(|| entry.channel_id.clone())
            })
        };

        match existing_channel {
            Some(channel) if channel == channel_id => {
                debug!(guild_id, channel_id, "already connected, reusing handle");
                return Ok(());
            }
            Some(_) => {
                self.disconnect(guild_id).await?;
            }
            None => {}
        }

        let connection = self.transport.join(guild_id, channel_id).await?;
        info!(guild_id, channel_id, "joined voice channel");

        let mut connections = self.connections.write().unwrap();
        connections.insert(
            guild_id.to_string(),
            GuildPlayback {
                channel_id: channel_id.to_string(),
                connection,
                paused: Arc::new(AtomicBool::new(false)),
                playing: Arc::new(AtomicBool::new(false)),
            },
        );
        Ok(())
    }

    /// Detaches a guild from its voice channel. Disconnecting a guild that
    /// was never connected succeeds without error.
    pub async fn disconnect(&self, guild_id: &str) -> Result<(), VoiceError> {
        let removed = self.connections.write().unwrap().remove(guild_id);
        if removed.is_some() {
            self.transport.leave(guild_id).await?;
            info!(guild_id, "left voice channel");
        }
        Ok(())
    }

    /// Plays one framed container: parse, then offer each frame to the
    /// transport in order. A single frame write that misses the deadline
    /// fails the whole utterance; skip halts delivery between frames.
    pub async fn play(&self, guild_id: &str, container_bytes: &[u8]) -> Result<(), VoiceError> {
        let frames = container::parse_framed(container_bytes)?;

        let (connection, playing) = {
            let connections = self.connections.read().unwrap();
            let entry = connections.get(guild_id).ok_or_else(|| {
                VoiceError::ConnectionLost(format!("guild {guild_id} has no voice connection"))
            })?;
            (entry.connection.clone(), entry.playing.clone())
        };

        playing.store(true, Ordering::SeqCst);
        let result = self.deliver_frames(&connection, &playing, frames).await;
        playing.store(false, Ordering::SeqCst);
        result
    }

    async fn deliver_frames(
        &self,
        connection: &Arc<dyn VoiceConnection>,
        playing: &Arc<AtomicBool>,
        frames: Vec<Vec<u8>>,
    ) -> Result<(), VoiceError> {
        for frame in frames {
            if !playing.load(Ordering::SeqCst) {
                debug!("playback skipped mid-utterance");
                return Ok(());
            }
            match timeout(self.frame_write_timeout, connection.send_frame(&frame)).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(
                        timeout_ms = self.frame_write_timeout.as_millis() as u64,
                        "frame write deadline exceeded"
                    );
                    return Err(VoiceError::PlaybackTimeout(self.frame_write_timeout));
                }
            }
        }
        Ok(())
    }

    /// Pauses message processing for the guild (observed by the scheduler).
    pub fn pause(&self, guild_id: &str) {
        if let Some(entry) = self.connections.read().unwrap().get(guild_id) {
            entry.paused.store(true, Ordering::SeqCst);
        }
    }

    pub fn resume(&self, guild_id: &str) {
        if let Some(entry) = self.connections.read().unwrap().get(guild_id) {
            entry.paused.store(false, Ordering::SeqCst);
        }
    }

    /// Abandons the rest of the current utterance, if one is mid-flight.
    pub fn skip(&self, guild_id: &str) {
        if let Some(entry) = self.connections.read().unwrap().get(guild_id) {
            entry.playing.store(false, Ordering::SeqCst);
        }
    }

    pub fn is_paused(&self, guild_id: &str) -> bool {
        self.connections
            .read()
            .unwrap()
            .get(guild_id)
            .map(|entry| entry.paused.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub fn is_playing(&self, guild_id: &str) -> bool {
        self.connections
            .read()
            .unwrap()
            .get(guild_id)
            .map(|entry| entry.playing.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub fn is_connected(&self, guild_id: &str) -> bool {
        self.connections
            .read()
            .unwrap()
            .get(guild_id)
            .map(|entry| entry.connection.is_alive())
            .unwrap_or(false)
    }

    /// The channel a guild is currently attached to, if any.
    pub fn connected_channel(&self, guild_id: &str) -> Option<String> {
        self.connections
            .read()
            .unwrap()
            .get(guild_id)
            .map(|entry| entry.channel_id.clone())
    }

    /// Per connected guild: whether the transport handle is still live.
    pub fn health_check(&self) -> HashMap<String, bool> {
        self.connections
            .read()
            .unwrap()
            .iter()
            .map(|(guild_id, entry)| (guild_id.clone(), entry.connection.is_alive()))
            .collect()
    }
}
