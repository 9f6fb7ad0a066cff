//! PCM16 audio helpers for the realtime wire.
//!
//! Audio travels base64-encoded as little-endian 16-bit samples; the
//! conversation engine stores and truncates decoded sample vectors.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{ColloquyError, Result};

/// Decode base64-encoded little-endian PCM16 into samples.
pub fn decode_pcm16(encoded: &str) -> Result<Vec<i16>> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|error| ColloquyError::Stream(format!("Invalid base64 audio payload: {error}")))?;
    if bytes.len() % 2 != 0 {
        return Err(ColloquyError::Stream(
            "PCM16 payload has an odd byte length".into(),
        ));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Encode samples as base64 little-endian PCM16.
pub fn encode_pcm16(samples: &[i16]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    STANDARD.encode(bytes)
}

/// Append `incoming` to `existing`, preserving order.
pub fn merge_samples(existing: &mut Vec<i16>, incoming: &[i16]) {
    existing.extend_from_slice(incoming);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_little_endian_samples() {
        // 0x0001 and -2 (0xfffe) little-endian.
        let encoded = STANDARD.encode([0x01, 0x00, 0xfe, 0xff]);
        assert_eq!(decode_pcm16(&encoded).unwrap(), vec![1, -2]);
    }

    #[test]
    fn encode_then_decode_preserves_samples() {
        let samples = vec![0, 1, -1, i16::MAX, i16::MIN];
        assert_eq!(decode_pcm16(&encode_pcm16(&samples)).unwrap(), samples);
    }

    #[test]
    fn rejects_odd_byte_length() {
        let encoded = STANDARD.encode([0x01, 0x00, 0xfe]);
        assert!(decode_pcm16(&encoded).is_err());
    }

    #[test]
    fn rejects_invalid_base64() {
        assert!(decode_pcm16("not base64!").is_err());
    }

    #[test]
    fn merge_appends_in_order() {
        let mut existing = vec![1, 2];
        merge_samples(&mut existing, &[3, 4]);
        assert_eq!(existing, vec![1, 2, 3, 4]);
    }
}
