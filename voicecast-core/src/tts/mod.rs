pub mod elevenlabs;
pub mod mock;
pub mod provider;
pub mod types;

pub use elevenlabs::{ElevenLabs, ElevenLabsConfig};
pub use mock::{MockBehavior, MockSynthesizer};
pub use provider::SpeechSynthesizer;
pub use types::{AudioData, SynthesisRequest, Voice};
