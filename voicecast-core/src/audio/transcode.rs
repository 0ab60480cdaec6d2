//! PCM conditioning: remix, resample, and volume gain.
//! Output always lands at 48 kHz stereo before encoding.

use super::{container, opus, TARGET_SAMPLE_RATE};
use crate::error::VoiceError;
use crate::settings::{OutputFormat, SynthesisConfig};
use crate::tts::AudioData;

/// Gain floor used for volume 0. Not silence, but far enough down that
/// nothing useful survives.
pub const MIN_GAIN_DB: f32 = -60.0;

/// Gain ceiling for volume 2.0 and above.
pub const MAX_GAIN_DB: f32 = 6.0;

/// Turns provider PCM into the guild's configured wire format: remix to
/// stereo, resample to 48 kHz, apply volume, then encode and package.
pub fn transcode(audio: &AudioData, config: &SynthesisConfig) -> Result<Vec<u8>, VoiceError> {
    if audio.sample_rate == 0 {
        return Err(VoiceError::InvalidInput(
            "audio sample rate must be non-zero".to_string(),
        ));
    }
    if audio.channels == 0 || audio.channels > 2 {
        return Err(VoiceError::InvalidInput(format!(
            "unsupported channel count: {}",
            audio.channels
        )));
    }

    let samples = pcm_bytes_to_i16(&audio.pcm_data);
    let stereo = remix_to_stereo(&samples, audio.channels);
    let resampled = resample_stereo(&stereo, audio.sample_rate, TARGET_SAMPLE_RATE);
    let gained = apply_volume(resampled, config.volume);

    match config.format {
        OutputFormat::Pcm => Ok(i16_to_le_bytes(&gained)),
        OutputFormat::Raw => {
            let frames = opus::encode_frames(&gained)?;
            Ok(container::write_raw(&frames))
        }
        OutputFormat::Framed => {
            let frames = opus::encode_frames(&gained)?;
            container::write_framed(&frames)
        }
    }
}

pub fn pcm_bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect()
}

pub fn i16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Mono input is duplicated into both channels; stereo passes through.
pub fn remix_to_stereo(samples: &[i16], channels: u16) -> Vec<i16> {
    match channels {
        1 => {
            let mut output = Vec::with_capacity(samples.len() * 2);
            for &sample in samples {
                output.push(sample);
                output.push(sample);
            }
            output
        }
        _ => samples.to_vec(),
    }
}

/// Linear-interpolation resampler over interleaved stereo samples.
///
/// Each output frame maps back to a fractional source position; the output
/// sample is `s0 + frac * (s1 - s0)` over the two bounding source frames,
/// with the trailing position clamped to the last frame instead of reading
/// past the end. A constant input therefore resamples to the same constant.
pub fn resample_stereo(samples: &[i16], source_rate: u32, target_rate: u32) -> Vec<i16> {
    if source_rate == target_rate {
        return samples.to_vec();
    }

    let input_frames = samples.len() / 2;
    if input_frames == 0 {
        return Vec::new();
    }

    let output_frames = ((input_frames as u64 * target_rate as u64 + source_rate as u64 / 2)
        / source_rate as u64) as usize;
    let step = source_rate as f64 / target_rate as f64;

    let mut output = Vec::with_capacity(output_frames * 2);
    for i in 0..output_frames {
        let position = i as f64 * step;
        let index = (position.floor() as usize).min(input_frames - 1);
        let next = (index + 1).min(input_frames - 1);
        let frac = position - index as f64;

        for ch in 0..2 {
            let s0 = samples[index * 2 + ch] as f64;
            let s1 = samples[next * 2 + ch] as f64;
            let value = s0 + frac * (s1 - s0);
            output.push(value.round() as i16);
        }
    }
    output
}

/// Maps a volume multiplier to a decibel adjustment.
///
/// 1.0 is unity (exactly 0 dB), 0 pins to `MIN_GAIN_DB`, 2.0 and above pin
/// to `MAX_GAIN_DB`. The in-between ranges are linear in dB per side rather
/// than a true logarithmic taper; downstream golden output depends on this
/// exact shape.
pub fn volume_to_db(volume: f32) -> f32 {
    if volume <= 0.0 {
        MIN_GAIN_DB
    } else if volume < 1.0 {
        (volume - 1.0) * -MIN_GAIN_DB
    } else if volume < 2.0 {
        (volume - 1.0) * MAX_GAIN_DB
    } else {
        MAX_GAIN_DB
    }
}

/// Applies the volume curve to the samples. Unity volume is a bit-exact
/// pass-through.
pub fn apply_volume(samples: Vec<i16>, volume: f32) -> Vec<i16> {
    let db = volume_to_db(volume);
    if db == 0.0 {
        return samples;
    }

    let scale = 10f32.powf(db / 20.0);
    samples
        .into_iter()
        .map(|sample| {
            let scaled = (sample as f32 * scale).round();
            scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
        })
        .collect()
}
