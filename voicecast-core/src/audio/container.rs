//! Byte-level packaging of encoded frames.
//!
//! The framed layout is the wire format playback consumes: each frame is
//! preceded by its byte length as a u16 little-endian prefix, frames
//! back-to-back until the end of the buffer, no trailing padding. Parsing is
//! strict; a damaged container is an error, never a best guess.

use super::MAX_FRAME_SIZE;
use crate::error::VoiceError;

/// Chunk size for the raw-stream boundary heuristic.
pub const RAW_SEGMENT_WINDOW: usize = 960;

/// Serializes frames with u16-LE length prefixes.
pub fn write_framed(frames: &[Vec<u8>]) -> Result<Vec<u8>, VoiceError> {
    let total: usize = frames.iter().map(|f| 2 + f.len()).sum();
    let mut buffer = Vec::with_capacity(total);

    for frame in frames {
        if frame.is_empty() {
            return Err(VoiceError::InvalidInput(
                "cannot write a zero-length frame".to_string(),
            ));
        }
        if frame.len() > MAX_FRAME_SIZE {
            return Err(VoiceError::InvalidInput(format!(
                "frame of {} bytes exceeds the {MAX_FRAME_SIZE} byte maximum",
                frame.len()
            )));
        }
        buffer.extend_from_slice(&(frame.len() as u16).to_le_bytes());
        buffer.extend_from_slice(frame);
    }
    Ok(buffer)
}

/// Concatenates frames with no delimiters. Frame boundaries are lost; see
/// `segment_raw` for the lossy read side.
pub fn write_raw(frames: &[Vec<u8>]) -> Vec<u8> {
    let total: usize = frames.iter().map(|f| f.len()).sum();
    let mut buffer = Vec::with_capacity(total);
    for frame in frames {
        buffer.extend_from_slice(frame);
    }
    buffer
}

/// Strictly parses a framed container back into discrete frames.
pub fn parse_framed(bytes: &[u8]) -> Result<Vec<Vec<u8>>, VoiceError> {
    let mut frames = Vec::new();
    let mut offset = 0usize;

    while offset < bytes.len() {
        if bytes.len() - offset < 2 {
            return Err(VoiceError::MalformedContainer(format!(
                "truncated frame header at offset {offset}"
            )));
        }
        let length = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]) as usize;
        offset += 2;

        if length == 0 {
            return Err(VoiceError::MalformedContainer(format!(
                "zero-length frame at offset {offset}"
            )));
        }
        if length > MAX_FRAME_SIZE {
            return Err(VoiceError::MalformedContainer(format!(
                "frame length {length} exceeds the {MAX_FRAME_SIZE} byte maximum"
            )));
        }
        if bytes.len() - offset < length {
            return Err(VoiceError::MalformedContainer(format!(
                "frame at offset {offset} claims {length} bytes but only {} remain",
                bytes.len() - offset
            )));
        }

        frames.push(bytes[offset..offset + length].to_vec());
        offset += length;
    }

    Ok(frames)
}

/// Best-effort segmentation of a raw Opus stream.
///
/// The stream carries no delimiters, so this simply chunks the buffer into
/// bounded fixed-size windows. That can split or merge real frames on
/// payloads that do not look like 20 ms speech; callers that need reliable
/// boundaries must use the framed container instead.
pub fn segment_raw(bytes: &[u8]) -> Vec<Vec<u8>> {
    bytes
        .chunks(RAW_SEGMENT_WINDOW.min(MAX_FRAME_SIZE))
        .map(|chunk| chunk.to_vec())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framed_round_trip_preserves_boundaries() {
        let frames = vec![vec![1u8; 3], vec![2u8; 120], vec![3u8; 1]];
        let buffer = write_framed(&frames).unwrap();

        let expected_len: usize = frames.iter().map(|f| 2 + f.len()).sum();
        assert_eq!(buffer.len(), expected_len);

        let parsed = parse_framed(&buffer).unwrap();
        assert_eq!(parsed, frames);
    }

    #[test]
    fn empty_container_parses_to_no_frames() {
        assert!(parse_framed(&[]).unwrap().is_empty());
    }

    #[test]
    fn truncated_header_is_rejected() {
        let mut buffer = write_framed(&[vec![9u8; 4]]).unwrap();
        buffer.push(0x05); // lone header byte
        assert!(matches!(
            parse_framed(&buffer),
            Err(VoiceError::MalformedContainer(_))
        ));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let buffer = vec![0x10, 0x00, 1, 2, 3]; // claims 16 bytes, has 3
        assert!(matches!(
            parse_framed(&buffer),
            Err(VoiceError::MalformedContainer(_))
        ));
    }

    #[test]
    fn zero_length_frame_is_rejected() {
        let buffer = vec![0x00, 0x00];
        assert!(matches!(
            parse_framed(&buffer),
            Err(VoiceError::MalformedContainer(_))
        ));
    }

    #[test]
    fn oversize_frame_length_is_rejected() {
        let length = (MAX_FRAME_SIZE + 1) as u16;
        let mut buffer = length.to_le_bytes().to_vec();
        buffer.extend(vec![0u8; MAX_FRAME_SIZE + 1]);
        assert!(matches!(
            parse_framed(&buffer),
            Err(VoiceError::MalformedContainer(_))
        ));
    }

    #[test]
    fn writer_refuses_invalid_frames() {
        assert!(write_framed(&[vec![]]).is_err());
        assert!(write_framed(&[vec![0u8; MAX_FRAME_SIZE + 1]]).is_err());
    }

    #[test]
    fn raw_write_concatenates_without_delimiters() {
        let frames = vec![vec![1u8, 2], vec![3u8]];
        assert_eq!(write_raw(&frames), vec![1, 2, 3]);
    }

    #[test]
    fn raw_segmentation_stays_within_bounds() {
        let stream = vec![7u8; RAW_SEGMENT_WINDOW * 2 + 10];
        let segments = segment_raw(&stream);
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.len() <= RAW_SEGMENT_WINDOW));
        let rejoined: Vec<u8> = segments.concat();
        assert_eq!(rejoined, stream);
    }
}
