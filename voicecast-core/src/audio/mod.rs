//! Audio transcoding from provider PCM to the transport's wire format.
//!
//! Providers return linear PCM at whatever rate and channel count they like;
//! the transport wants 48 kHz stereo Opus in 20 ms frames. Everything between
//! lives here: channel remix, resampling, volume gain, Opus encoding, and the
//! frame container.

pub mod container;
pub mod opus;
pub mod transcode;

pub use transcode::transcode;

/// Sample rate required by the streaming transport.
pub const TARGET_SAMPLE_RATE: u32 = 48_000;

/// Channel count required by the streaming transport.
pub const TARGET_CHANNELS: u16 = 2;

/// Samples per channel in one 20 ms frame at 48 kHz.
pub const FRAME_SAMPLES: usize = 960;

/// Upper bound on a single encoded Opus frame in bytes.
pub const MAX_FRAME_SIZE: usize = 4000;
