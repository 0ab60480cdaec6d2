use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::transport::{VoiceConnection, VoiceTransport};
use crate::error::VoiceError;

/// Mock voice connection that records every frame it is handed.
pub struct MockConnection {
    channel_id: String,
    frames: Mutex<Vec<Vec<u8>>>,
    alive: AtomicBool,
    fail_sends: AtomicBool,
    send_delay: Mutex<Option<Duration>>,
}

impl MockConnection {
    fn new(channel_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            frames: Mutex::new(Vec::new()),
            alive: AtomicBool::new(true),
            fail_sends: AtomicBool::new(false),
            send_delay: Mutex::new(None),
        }
    }

    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().unwrap().clone()
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Delays every send, for exercising the frame-write deadline.
    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = Some(delay);
    }

    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl VoiceConnection for MockConnection {
    fn channel_id(&self) -> &str {
        &self.channel_id
    }

    async fn send_frame(&self, frame: &[u8]) -> Result<(), VoiceError> {
        let delay = *self.send_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(VoiceError::ConnectionLost(
                "mock connection dropped".to_string(),
            ));
        }
        self.frames.lock().unwrap().push(frame.to_vec());
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Mock transport backend for tests: join/leave bookkeeping plus scripted
/// join failures.
#[derive(Clone, Default)]
pub struct MockTransport {
    connections: Arc<Mutex<HashMap<String, Arc<MockConnection>>>>,
    join_count: Arc<Mutex<usize>>,
    leave_count: Arc<Mutex<usize>>,
    failing_joins: Arc<Mutex<usize>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live mock connection for a guild, if one exists.
    pub fn connection(&self, guild_id: &str) -> Option<Arc<MockConnection>> {
        self.connections.lock().unwrap().get(guild_id).cloned()
    }

    pub fn join_count(&self) -> usize {
        *self.join_count.lock().unwrap()
    }

    pub fn leave_count(&self) -> usize {
        *self.leave_count.lock().unwrap()
    }

    /// Makes the next `count` join calls fail with a connection error.
    pub fn fail_next_joins(&self, count: usize) {
        *self.failing_joins.lock().unwrap() = count;
    }
}

#[async_trait]
impl VoiceTransport for MockTransport {
    async fn join(
        &self,
        guild_id: &str,
        channel_id: &str,
    ) -> Result<Arc<dyn VoiceConnection>, VoiceError> {
        *self.join_count.lock().unwrap() += 1;

        {
            let mut failing = self.failing_joins.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(VoiceError::ConnectionLost(
                    "mock transport refused the join".to_string(),
                ));
            }
        }

        let connection = Arc::new(MockConnection::new(channel_id));
        self.connections
            .lock()
            .unwrap()
            .insert(guild_id.to_string(), connection.clone());
        Ok(connection)
    }

    async fn leave(&self, guild_id: &str) -> Result<(), VoiceError> {
        *self.leave_count.lock().unwrap() += 1;
        if let Some(connection) = self.connections.lock().unwrap().remove(guild_id) {
            connection.kill();
        }
        Ok(())
    }
}
