//! Opus encoding of 48 kHz stereo PCM into discrete 20 ms frames.

use audiopus::coder::Encoder;
use audiopus::{Application, Channels, SampleRate};

use super::{FRAME_SAMPLES, MAX_FRAME_SIZE, TARGET_CHANNELS};
use crate::error::VoiceError;

/// Encodes interleaved 48 kHz stereo samples into independent Opus frames of
/// 960 samples per channel. The final partial window is zero-padded to full
/// size rather than dropped, so trailing audio always reaches the listener.
pub fn encode_frames(samples: &[i16]) -> Result<Vec<Vec<u8>>, VoiceError> {
    let mut encoder = Encoder::new(SampleRate::Hz48000, Channels::Stereo, Application::Audio)
        .map_err(|e| VoiceError::Codec(anyhow::anyhow!("failed to create encoder: {e:?}")))?;

    let window = FRAME_SAMPLES * TARGET_CHANNELS as usize;
    let mut frames = Vec::with_capacity(samples.len() / window + 1);

    for chunk in samples.chunks(window) {
        let mut output = vec![0u8; MAX_FRAME_SIZE];
        let written = if chunk.len() == window {
            encoder.encode(chunk, &mut output)
        } else {
            let mut padded = chunk.to_vec();
            padded.resize(window, 0);
            encoder.encode(&padded, &mut output)
        }
        .map_err(|e| VoiceError::Codec(anyhow::anyhow!("opus encode failed: {e:?}")))?;

        output.truncate(written);
        frames.push(output);
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use audiopus::coder::Decoder;

    fn stereo_tone(frames: usize) -> Vec<i16> {
        (0..frames)
            .flat_map(|i| {
                let sample = ((i as f32 * 0.05).sin() * 8000.0) as i16;
                [sample, sample]
            })
            .collect()
    }

    #[test]
    fn one_frame_per_full_window() {
        let samples = stereo_tone(FRAME_SAMPLES * 3);
        let frames = encode_frames(&samples).unwrap();
        assert_eq!(frames.len(), 3);
        for frame in &frames {
            assert!(!frame.is_empty());
            assert!(frame.len() <= MAX_FRAME_SIZE);
        }
    }

    #[test]
    fn partial_tail_window_is_padded_not_dropped() {
        let samples = stereo_tone(FRAME_SAMPLES * 2 + 100);
        let frames = encode_frames(&samples).unwrap();
        assert_eq!(frames.len(), 3);
    }

    #[test]
    fn empty_input_produces_no_frames() {
        assert!(encode_frames(&[]).unwrap().is_empty());
    }

    #[test]
    fn frames_decode_to_full_windows() {
        let samples = stereo_tone(FRAME_SAMPLES + 1);
        let frames = encode_frames(&samples).unwrap();
        assert_eq!(frames.len(), 2);

        let mut decoder = Decoder::new(SampleRate::Hz48000, Channels::Stereo).unwrap();
        for frame in &frames {
            let mut pcm = vec![0i16; FRAME_SAMPLES * 2];
            let decoded = decoder.decode(Some(frame.as_slice()), &mut pcm, false).unwrap();
            assert_eq!(decoded, FRAME_SAMPLES);
        }
    }
}
