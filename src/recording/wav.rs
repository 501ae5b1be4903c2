// WAV encoding of finished takes
// 16-bit little-endian PCM, stereo interleaved, canonical 44-byte header.

use crate::recording::processing::{ProcessedTake, ProcessingError};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

pub const WAV_HEADER_LEN: usize = 44;

/// Convert f32 sample to i16
///
/// Maps [-1.0, 1.0] to [i16::MIN, i16::MAX], out-of-range input is clipped.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    let clamped = if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    };
    if clamped >= 0.0 {
        (clamped * i16::MAX as f32) as i16
    } else {
        (clamped * -(i16::MIN as f32)) as i16
    }
}

/// Encode a stereo pair into an in-memory WAV file
pub fn encode_stereo_pcm16(
    left: &[f32],
    right: &[f32],
    sample_rate: u32,
) -> Result<Vec<u8>, ProcessingError> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + left.len() * 4));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for (l, r) in left.iter().zip(right) {
            writer.write_sample(f32_to_i16(*l))?;
            writer.write_sample(f32_to_i16(*r))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

pub fn encode_take(take: &ProcessedTake) -> Result<Vec<u8>, ProcessingError> {
    encode_stereo_pcm16(&take.left, &take.right, take.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_to_i16_conversion() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(-1.0), i16::MIN);
        assert_eq!(f32_to_i16(3.0), i16::MAX);
        assert_eq!(f32_to_i16(f32::NAN), 0);
    }

    #[test]
    fn test_canonical_header() {
        let bytes = encode_stereo_pcm16(&[0.5, -0.5], &[0.25, 0.0], 48000).unwrap();
        assert_eq!(bytes.len(), WAV_HEADER_LEN + 2 * 2 * 2);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        // PCM format tag, 2 channels
        assert_eq!(u16::from_le_bytes([bytes[20], bytes[21]]), 1);
        assert_eq!(u16::from_le_bytes([bytes[22], bytes[23]]), 2);
        assert_eq!(
            u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]),
            48000
        );
        assert_eq!(u16::from_le_bytes([bytes[34], bytes[35]]), 16);
        assert_eq!(&bytes[36..40], b"data");
        // First left sample, little endian
        assert_eq!(
            i16::from_le_bytes([bytes[44], bytes[45]]),
            f32_to_i16(0.5)
        );
    }

    #[test]
    fn test_encoded_take_reads_back() {
        let bytes = encode_stereo_pcm16(&[0.0, 0.5, 1.0], &[0.0, 0.5, 1.0], 44100).unwrap();
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(reader.len(), 6);
    }
}
