use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// `PipelineEvent` are the messages emitted by the pipeline - the output side
/// of the processor.
///
/// The pipeline itself never talks to users directly; command layers (bot
/// front ends, dashboards, tests) receive these events and decide how to
/// render them. Narration events carry the fixed user-facing sentences
/// produced by error recovery and the idle notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum PipelineEvent {
    Narration(NarrationMessage),
    RetryAttempt {
        guild_id: String,
        attempt: u32,
        max_retries: u32,
        error: String,
        delay_ms: u64,
    },
    PlaybackStarted {
        guild_id: String,
        utterance_id: String,
    },
    PlaybackFinished {
        guild_id: String,
        utterance_id: String,
    },
    UtteranceDropped {
        guild_id: String,
        utterance_id: String,
        error: String,
    },
    GuildUnhealthy {
        guild_id: String,
        consecutive_failures: u32,
    },
}

/// A user-facing sentence scoped to one guild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationMessage {
    pub timestamp: u64,
    pub guild_id: String,
    pub content: String,
}

impl NarrationMessage {
    pub fn new(guild_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis() as u64,
            guild_id: guild_id.into(),
            content: content.into(),
        }
    }
}

/// Cloneable sending half of the pipeline event stream.
///
/// Sends are lossy on purpose: if no command layer is listening the pipeline
/// keeps speaking regardless.
#[derive(Clone)]
pub struct EventSender {
    event_tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl EventSender {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (event_tx, rx) = mpsc::unbounded_channel();
        (Self { event_tx }, rx)
    }

    pub fn send(&self, event: PipelineEvent) {
        let _ = self.event_tx.send(event);
    }

    pub fn narrate(&self, guild_id: &str, content: impl Into<String>) {
        self.send(PipelineEvent::Narration(NarrationMessage::new(
            guild_id, content,
        )));
    }
}
