//! Per-guild bounded FIFO of pending utterances.
//!
//! Queues are created lazily on first enqueue, live only in memory, and drop
//! their oldest entry when a new message arrives at capacity. Producers are
//! command handlers on arbitrary tasks; the scheduler is the only consumer
//! per guild.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::VoiceError;

pub const DEFAULT_QUEUE_CAPACITY: usize = 10;
pub const MIN_QUEUE_CAPACITY: usize = 1;
pub const MAX_QUEUE_CAPACITY: usize = 100;

/// One message awaiting synthesis. Immutable once created; owned by the
/// queue until dequeued, then by the scheduler for the rest of processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedUtterance {
    pub id: Uuid,
    pub guild_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
    pub text: String,
    pub queued_at: DateTime<Utc>,
}

impl QueuedUtterance {
    pub fn new(
        guild_id: impl Into<String>,
        channel_id: impl Into<String>,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            guild_id: guild_id.into(),
            channel_id: channel_id.into(),
            user_id: user_id.into(),
            user_name: user_name.into(),
            text: text.into(),
            queued_at: Utc::now(),
        }
    }
}

struct GuildQueue {
    entries: VecDeque<QueuedUtterance>,
    capacity: usize,
}

impl GuildQueue {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    fn push(&mut self, utterance: QueuedUtterance) -> Option<QueuedUtterance> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(utterance);
        evicted
    }
}

/// Registry of per-guild queues behind a single reader/writer lock.
pub struct MessageQueue {
    queues: RwLock<HashMap<String, GuildQueue>>,
    default_capacity: usize,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(default_capacity: usize) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            default_capacity,
        }
    }

    /// Appends an utterance to its guild's queue. At capacity the oldest
    /// entry is evicted first; eviction is not an error.
    pub fn enqueue(&self, utterance: QueuedUtterance) -> Result<(), VoiceError> {
        if utterance.guild_id.is_empty() {
            return Err(VoiceError::InvalidInput(
                "utterance is missing a guild id".to_string(),
            ));
        }

        let mut queues = self.queues.write().unwrap();
        let queue = queues
            .entry(utterance.guild_id.clone())
            .or_insert_with(|| GuildQueue::new(self.default_capacity));

        let guild_id = utterance.guild_id.clone();
        if let Some(evicted) = queue.push(utterance) {
            debug!(
                guild_id = %guild_id,
                dropped = %evicted.id,
                "queue at capacity, dropped oldest utterance"
            );
        }
        Ok(())
    }

    /// Removes and returns the oldest pending utterance, or `None` when the
    /// guild has nothing queued.
    pub fn dequeue(&self, guild_id: &str) -> Option<QueuedUtterance> {
        let mut queues = self.queues.write().unwrap();
        queues.get_mut(guild_id)?.entries.pop_front()
    }

    pub fn size(&self, guild_id: &str) -> usize {
        self.queues
            .read()
            .unwrap()
            .get(guild_id)
            .map(|q| q.entries.len())
            .unwrap_or(0)
    }

    pub fn clear(&self, guild_id: &str) {
        if let Some(queue) = self.queues.write().unwrap().get_mut(guild_id) {
            queue.entries.clear();
        }
    }

    /// Drops the guild's queue entirely, capacity override included.
    pub fn remove_guild(&self, guild_id: &str) {
        self.queues.write().unwrap().remove(guild_id);
    }

    /// Changes a guild's capacity. Shrinking trims from the front so the
    /// most recent `capacity` entries survive.
    pub fn set_max_size(&self, guild_id: &str, capacity: usize) -> Result<(), VoiceError> {
        if !(MIN_QUEUE_CAPACITY..=MAX_QUEUE_CAPACITY).contains(&capacity) {
            return Err(VoiceError::InvalidInput(format!(
                "queue capacity {capacity} out of range [{MIN_QUEUE_CAPACITY}, {MAX_QUEUE_CAPACITY}]"
            )));
        }

        let mut queues = self.queues.write().unwrap();
        let queue = queues
            .entry(guild_id.to_string())
            .or_insert_with(|| GuildQueue::new(self.default_capacity));
        queue.capacity = capacity;
        while queue.entries.len() > capacity {
            queue.entries.pop_front();
        }
        Ok(())
    }
}
