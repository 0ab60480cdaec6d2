//! voicecast-core: per-guild text-to-speech playback for live voice sessions.
//!
//! Messages flow from a front end into the [`queue::MessageQueue`], where the
//! [`scheduler::GuildProcessor`] drains them one guild at a time: synthesize
//! through a [`tts::SpeechSynthesizer`], condition and encode through
//! [`audio`], then stream 20 ms frames through the [`playback::PlaybackEngine`]
//! into the guild's voice channel. [`recovery::ErrorRecovery`] wraps the
//! fallible stages with bounded retries, reconnection, and per-guild health.

pub mod audio;
pub mod error;
pub mod events;
pub mod playback;
pub mod queue;
pub mod recovery;
pub mod scheduler;
pub mod settings;
pub mod tts;

// Public library API - front ends (bot gateways, dashboards, tests) should
// only need these types.
pub use error::VoiceError;
pub use events::{EventSender, PipelineEvent};
pub use playback::{PlaybackEngine, VoiceConnection, VoiceTransport};
pub use queue::{MessageQueue, QueuedUtterance};
pub use recovery::{ErrorRecovery, ErrorStats};
pub use scheduler::GuildProcessor;
pub use settings::{OutputFormat, PipelineSettings, SynthesisConfig, SynthesisConfigRegistry};
pub use tts::SpeechSynthesizer;
