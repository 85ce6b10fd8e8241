//! Sample blocks and host payload decoding.
//!
//! The host delivers interleaved little-endian `f32` PCM, either as raw bytes
//! or base64 text. Frames are `4 * channels` bytes wide; a missing Z channel
//! reads as a constant 1.0.

use base64::{engine::general_purpose, Engine as _};

/// Errors that can occur while decoding a sample payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BlockError {
    #[error("Invalid base64 payload: {0}")]
    Base64(String),
    #[error("Payload has {got} bytes but {needed} are needed for {frames} frames")]
    Truncated {
        needed: usize,
        got: usize,
        frames: usize,
    },
    #[error("Unsupported channel count {0}, expected 2 or 3")]
    UnsupportedChannels(usize),
}

/// Encoded sample payload as handed over by the host bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Binary(Vec<u8>),
    Base64(String),
}

impl Payload {
    /// Resolve the payload to raw PCM bytes.
    pub fn into_bytes(self) -> Result<Vec<u8>, BlockError> {
        match self {
            Payload::Binary(bytes) => Ok(bytes),
            Payload::Base64(text) => general_purpose::STANDARD
                .decode(text.trim())
                .map_err(|e| BlockError::Base64(e.to_string())),
        }
    }
}

/// One block of X/Y/Z samples, all channels the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub channels: usize,
}

impl SampleBlock {
    /// A block of `len` zeros with Z at 1.0.
    pub fn silent(len: usize, channels: usize) -> Self {
        Self {
            x: vec![0.0; len],
            y: vec![0.0; len],
            z: vec![1.0; len],
            channels,
        }
    }

    /// Build a block from separate channel series. Z defaults to 1.0.
    pub fn from_channels(x: Vec<f32>, y: Vec<f32>, z: Option<Vec<f32>>) -> Self {
        let channels = if z.is_some() { 3 } else { 2 };
        let z = z.unwrap_or_else(|| vec![1.0; x.len()]);
        Self { x, y, z, channels }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn has_z(&self) -> bool {
        self.channels == 3
    }
}

/// Extract `frames` interleaved frames from raw PCM bytes.
pub fn decode_pcm(bytes: &[u8], channels: usize, frames: usize) -> Result<SampleBlock, BlockError> {
    if !(2..=3).contains(&channels) {
        return Err(BlockError::UnsupportedChannels(channels));
    }
    let stride = 4 * channels;
    let needed = stride * frames;
    if bytes.len() < needed {
        return Err(BlockError::Truncated {
            needed,
            got: bytes.len(),
            frames,
        });
    }

    let mut block = SampleBlock::silent(frames, channels);
    for (i, frame) in bytes[..needed].chunks_exact(stride).enumerate() {
        block.x[i] = read_f32(frame, 0);
        block.y[i] = read_f32(frame, 4);
        if channels == 3 {
            block.z[i] = read_f32(frame, 8);
        }
    }
    Ok(block)
}

/// Decode a host payload into a sample block.
pub fn decode_payload(payload: Payload, channels: usize, frames: usize) -> Result<SampleBlock, BlockError> {
    let bytes = payload.into_bytes()?;
    decode_pcm(&bytes, channels, frames)
}

#[inline]
fn read_f32(frame: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([
        frame[offset],
        frame[offset + 1],
        frame[offset + 2],
        frame[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interleave(frames: &[[f32; 3]], channels: usize) -> Vec<u8> {
        frames
            .iter()
            .flat_map(|f| f[..channels].iter().flat_map(|v| v.to_le_bytes()))
            .collect()
    }

    #[test]
    fn test_decode_stereo_defaults_z() {
        let bytes = interleave(&[[0.5, -0.5, 9.0], [0.25, 0.75, 9.0]], 2);
        let block = decode_pcm(&bytes, 2, 2).unwrap();
        assert_eq!(block.x, vec![0.5, 0.25]);
        assert_eq!(block.y, vec![-0.5, 0.75]);
        assert_eq!(block.z, vec![1.0, 1.0]);
        assert!(!block.has_z());
    }

    #[test]
    fn test_decode_three_channels() {
        let bytes = interleave(&[[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]], 3);
        let block = decode_pcm(&bytes, 3, 2).unwrap();
        assert_eq!(block.z, vec![0.3, 0.6]);
    }

    #[test]
    fn test_short_payload_is_truncated_error() {
        let bytes = interleave(&[[0.1, 0.2, 0.0]], 2);
        let err = decode_pcm(&bytes, 2, 2).unwrap_err();
        assert_eq!(
            err,
            BlockError::Truncated {
                needed: 16,
                got: 8,
                frames: 2
            }
        );
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let bytes = interleave(&[[0.1, 0.2, 0.0], [0.3, 0.4, 0.0], [0.5, 0.6, 0.0]], 2);
        let block = decode_pcm(&bytes, 2, 2).unwrap();
        assert_eq!(block.len(), 2);
    }

    #[test]
    fn test_base64_payload() {
        let bytes = interleave(&[[1.0, -1.0, 0.0]], 2);
        let text = general_purpose::STANDARD.encode(&bytes);
        let block = decode_payload(Payload::Base64(text), 2, 1).unwrap();
        assert_eq!(block.x, vec![1.0]);
        assert_eq!(block.y, vec![-1.0]);
    }

    #[test]
    fn test_bad_base64_rejected() {
        let err = decode_payload(Payload::Base64("***".into()), 2, 1).unwrap_err();
        assert!(matches!(err, BlockError::Base64(_)));
    }

    #[test]
    fn test_unsupported_channel_count() {
        assert_eq!(
            decode_pcm(&[0; 16], 1, 1).unwrap_err(),
            BlockError::UnsupportedChannels(1)
        );
    }
}
