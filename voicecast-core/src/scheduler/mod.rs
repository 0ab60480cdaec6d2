//! The per-guild processing loop.
//!
//! One background task drives every guild cooperatively on a fixed tick.
//! Each tick scans the active guilds and, for any that are connected, not
//! busy, and not paused, pulls one utterance and spawns its
//! synthesize/transcode/play run. The busy flag keeps at most one utterance
//! in flight per guild while leaving other guilds free to proceed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::audio;
use crate::error::VoiceError;
use crate::events::{EventSender, PipelineEvent};
use crate::playback::PlaybackEngine;
use crate::queue::{MessageQueue, QueuedUtterance};
use crate::recovery::{user_friendly_message, truncate_with_ellipsis, ErrorCategory, ErrorRecovery};
use crate::settings::{OutputFormat, PipelineSettings, SynthesisConfig, SynthesisConfigRegistry};
use crate::tts::SpeechSynthesizer;

/// Spoken once per quiet stretch, then suppressed until new messages arrive.
pub const IDLE_NOTICE: &str =
    "I haven't seen any new messages in a while. I'm still here when you need me.";

/// Runtime state for one actively-processing guild. Created by
/// `start_processing`, destroyed by `stop_processing`.
struct GuildState {
    busy: AtomicBool,
    idle_announced: AtomicBool,
    last_activity: Mutex<Instant>,
}

impl GuildState {
    fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
            idle_announced: AtomicBool::new(false),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_activity.lock().unwrap() = Instant::now();
        self.idle_announced.store(false, Ordering::SeqCst);
    }

    fn idle_for(&self) -> std::time::Duration {
        self.last_activity.lock().unwrap().elapsed()
    }
}

struct ProcessorInner {
    queue: Arc<MessageQueue>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    playback: Arc<PlaybackEngine>,
    recovery: Arc<ErrorRecovery>,
    configs: Arc<SynthesisConfigRegistry>,
    settings: PipelineSettings,
    events: EventSender,
    guilds: RwLock<HashMap<String, Arc<GuildState>>>,
}

/// The `GuildProcessor` owns the polling loop and composes the queue,
/// synthesis adapter, transcoder, playback engine, and recovery layer.
///
/// Front ends register guilds with `start_processing`, feed the shared
/// `MessageQueue`, and render the `PipelineEvent` stream; the processor does
/// everything in between.
pub struct GuildProcessor {
    inner: Arc<ProcessorInner>,
    cancel_tx: Mutex<Option<mpsc::UnboundedSender<()>>>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl GuildProcessor {
    pub fn new(
        queue: Arc<MessageQueue>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        playback: Arc<PlaybackEngine>,
        recovery: Arc<ErrorRecovery>,
        configs: Arc<SynthesisConfigRegistry>,
        settings: PipelineSettings,
        events: EventSender,
    ) -> Self {
        Self {
            inner: Arc::new(ProcessorInner {
                queue,
                synthesizer,
                playback,
                recovery,
                configs,
                settings,
                events,
                guilds: RwLock::new(HashMap::new()),
            }),
            cancel_tx: Mutex::new(None),
            loop_handle: Mutex::new(None),
        }
    }

    /// Joins the guild's voice channel and registers it with the loop.
    pub async fn start_processing(
        &self,
        guild_id: &str,
        channel_id: &str,
    ) -> Result<(), VoiceError> {
        self.inner.playback.connect(guild_id, channel_id).await?;
        self.inner
            .guilds
            .write()
            .unwrap()
            .insert(guild_id.to_string(), Arc::new(GuildState::new()));
        info!(guild_id, channel_id, "started processing");
        Ok(())
    }

    /// Unregisters the guild, drops its queue, and leaves the channel.
    pub async fn stop_processing(&self, guild_id: &str) -> Result<(), VoiceError> {
        self.inner.guilds.write().unwrap().remove(guild_id);
        self.inner.queue.remove_guild(guild_id);
        self.inner.playback.disconnect(guild_id).await?;
        info!(guild_id, "stopped processing");
        Ok(())
    }

    pub fn is_processing(&self, guild_id: &str) -> bool {
        self.inner.guilds.read().unwrap().contains_key(guild_id)
    }

    /// Launches the background polling loop. Calling start on a running
    /// processor is a no-op.
    pub fn start(&self) {
        let mut handle_slot = self.loop_handle.lock().unwrap();
        if handle_slot.is_some() {
            warn!("processor loop already running");
            return;
        }

        let (cancel_tx, mut cancel_rx) = mpsc::unbounded_channel();
        *self.cancel_tx.lock().unwrap() = Some(cancel_tx);

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(inner.settings.tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                tick_ms = inner.settings.tick_interval.as_millis() as u64,
                "processor loop started"
            );
            loop {
                tokio::select! {
                    _ = cancel_rx.recv() => {
                        info!("processor loop stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        inner.tick();
                    }
                }
            }
        });
        *handle_slot = Some(handle);
    }

    /// Signals the loop to stop after its current tick and waits for it to
    /// exit. No work continues after this returns.
    pub async fn stop(&self) {
        if let Some(cancel_tx) = self.cancel_tx.lock().unwrap().take() {
            let _ = cancel_tx.send(());
        }
        let handle = self.loop_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl ProcessorInner {
    /// One scan over every registered guild. Never blocks on synthesis or
    /// playback; eligible work is spawned onto its own task.
    fn tick(self: &Arc<Self>) {
        let guilds: Vec<(String, Arc<GuildState>)> = self
            .guilds
            .read()
            .unwrap()
            .iter()
            .map(|(id, state)| (id.clone(), state.clone()))
            .collect();

        for (guild_id, state) in guilds {
            if !self.playback.is_connected(&guild_id) {
                continue;
            }
            if state.busy.load(Ordering::SeqCst) {
                continue;
            }
            if self.playback.is_paused(&guild_id) {
                continue;
            }

            if let Some(utterance) = self.queue.dequeue(&guild_id) {
                state.touch();
                state.busy.store(true, Ordering::SeqCst);
                let inner = self.clone();
                tokio::spawn(async move {
                    inner.process_utterance(&guild_id, utterance).await;
                    state.busy.store(false, Ordering::SeqCst);
                });
            } else if !state.idle_announced.load(Ordering::SeqCst)
                && state.idle_for() >= self.settings.inactivity_threshold
            {
                state.busy.store(true, Ordering::SeqCst);
                let inner = self.clone();
                tokio::spawn(async move {
                    inner.announce_idle(&guild_id).await;
                    state.idle_announced.store(true, Ordering::SeqCst);
                    state.busy.store(false, Ordering::SeqCst);
                });
            }
        }
    }

    async fn process_utterance(&self, guild_id: &str, utterance: QueuedUtterance) {
        let config = self.configs.get(guild_id);
        let spoken = format!("{} says: {}", utterance.user_name, utterance.text);
        let spoken = truncate_with_ellipsis(&spoken, self.settings.max_spoken_chars);

        self.events.send(PipelineEvent::PlaybackStarted {
            guild_id: guild_id.to_string(),
            utterance_id: utterance.id.to_string(),
        });

        match self.speak(guild_id, &spoken, &config).await {
            Ok(()) => {
                debug!(guild_id, utterance_id = %utterance.id, "utterance played");
                self.events.send(PipelineEvent::PlaybackFinished {
                    guild_id: guild_id.to_string(),
                    utterance_id: utterance.id.to_string(),
                });
            }
            Err(error) => {
                // One utterance failing must never stall the guild's loop
                warn!(guild_id, error = %error, "failed to play utterance, skipping");
                self.events.narrate(guild_id, user_friendly_message(&error));
                self.events.send(PipelineEvent::UtteranceDropped {
                    guild_id: guild_id.to_string(),
                    utterance_id: utterance.id.to_string(),
                    error: error.to_string(),
                });
            }
        }
    }

    async fn announce_idle(&self, guild_id: &str) {
        let config = self.configs.get(guild_id);
        info!(guild_id, "queue quiet, announcing idle notice");
        self.events.narrate(guild_id, IDLE_NOTICE);
        if let Err(error) = self.speak(guild_id, IDLE_NOTICE, &config).await {
            warn!(guild_id, error = %error, "failed to play idle notice");
        }
    }

    /// Synthesize, transcode, and play one piece of text. Playback always
    /// consumes the framed container; the guild's configured format applies
    /// to exports through the public transcoder, not to the live path.
    async fn speak(
        &self,
        guild_id: &str,
        text: &str,
        config: &SynthesisConfig,
    ) -> Result<(), VoiceError> {
        let audio = self
            .recovery
            .synthesize_with_recovery(self.synthesizer.as_ref(), guild_id, text, config)
            .await?;

        let playback_config = SynthesisConfig {
            format: OutputFormat::Framed,
            ..config.clone()
        };
        let container = audio::transcode(&audio, &playback_config).map_err(|error| {
            self.recovery
                .record_failure(guild_id, ErrorCategory::TtsConversion);
            error
        })?;

        match self.playback.play(guild_id, &container).await {
            Ok(()) => {
                self.recovery.record_success(guild_id);
                Ok(())
            }
            Err(error) => {
                match &error {
                    VoiceError::ConnectionLost(_) => {
                        self.recovery
                            .record_failure(guild_id, ErrorCategory::VoiceConnection);
                        if let Err(reconnect_error) =
                            self.recovery.reconnect(&self.playback, guild_id).await
                        {
                            warn!(
                                guild_id,
                                error = %reconnect_error,
                                "reconnection after playback failure also failed"
                            );
                        }
                    }
                    _ => {
                        self.recovery
                            .record_failure(guild_id, ErrorCategory::Playback);
                    }
                }
                Err(error)
            }
        }
    }
}
