//! Audio frames and their wire representation.
//!
//! Outbound, the capture stream is sliced into fixed-length frames and
//! serialized as little-endian PCM16 for base64 embedding at the message
//! layer. Inbound, received byte sequences are parsed back into frames.

/// A fixed-length group of PCM16 samples processed as a unit.
///
/// The sample rate is determined by the pipeline stage that produced the
/// frame: capture rate for outbound frames, playback rate for inbound ones.
/// Frames are immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl AudioFrame {
    /// Create a frame from PCM16 samples at the given rate.
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Parse a little-endian PCM16 byte sequence into a frame.
    ///
    /// A trailing odd byte is ignored; it is an artifact of transport
    /// chunking, not an error.
    pub fn from_le_bytes(bytes: &[u8], sample_rate: u32) -> Self {
        Self {
            samples: decode_pcm16le(bytes),
            sample_rate,
        }
    }

    /// The PCM16 samples in this frame.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// The sample rate this frame was produced at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples in the frame.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the frame holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Serialize the frame as little-endian PCM16 bytes.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        encode_pcm16le(&self.samples)
    }
}

/// Encode PCM16 samples as bytes, low byte first.
pub fn encode_pcm16le(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Decode little-endian byte pairs into PCM16 samples.
///
/// A byte sequence of length `2n + 1` decodes to exactly `n` samples; the
/// incomplete trailing byte is discarded.
pub fn decode_pcm16le(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Slices a continuous capture stream into fixed-length frames.
///
/// Capture callbacks deliver buffers of whatever size the device chose;
/// the chunker accumulates them and emits frames of exactly `frame_len`
/// samples, carrying any residual into the next call.
#[derive(Debug)]
pub struct FrameChunker {
    frame_len: usize,
    pending: Vec<f32>,
}

impl FrameChunker {
    /// Create a chunker emitting frames of `frame_len` samples.
    pub fn new(frame_len: usize) -> Self {
        assert!(frame_len > 0, "frame length must be non-zero");
        Self {
            frame_len,
            pending: Vec::with_capacity(frame_len * 2),
        }
    }

    /// Feed captured samples in; returns zero or more complete frames.
    pub fn push(&mut self, input: &[f32]) -> Vec<Vec<f32>> {
        self.pending.extend_from_slice(input);
        let mut frames = Vec::new();
        while self.pending.len() >= self.frame_len {
            let rest = self.pending.split_off(self.frame_len);
            frames.push(std::mem::replace(&mut self.pending, rest));
        }
        frames
    }

    /// Samples held back waiting for a complete frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_little_endian() {
        assert_eq!(encode_pcm16le(&[0x1234, -2]), vec![0x34, 0x12, 0xFE, 0xFF]);
    }

    #[test]
    fn test_round_trip_even_length() {
        let samples = vec![0, 1, -1, i16::MAX, i16::MIN, 256, -257];
        assert_eq!(decode_pcm16le(&encode_pcm16le(&samples)), samples);
    }

    #[test]
    fn test_odd_length_discards_trailing_byte() {
        let mut bytes = encode_pcm16le(&[100, -200, 300]);
        bytes.push(0xAB);
        assert_eq!(decode_pcm16le(&bytes), vec![100, -200, 300]);
    }

    #[test]
    fn test_single_byte_decodes_to_nothing() {
        assert_eq!(decode_pcm16le(&[0x7F]), Vec::<i16>::new());
        assert_eq!(decode_pcm16le(&[]), Vec::<i16>::new());
    }

    #[test]
    fn test_frame_from_le_bytes() {
        let frame = AudioFrame::from_le_bytes(&[0x00, 0x40, 0xFF], 24000);
        assert_eq!(frame.samples(), &[0x4000]);
        assert_eq!(frame.sample_rate(), 24000);
        assert_eq!(frame.len(), 1);
    }

    #[test]
    fn test_frame_to_le_bytes_round_trip() {
        let frame = AudioFrame::new(vec![5, -5, 0], 16000);
        let decoded = AudioFrame::from_le_bytes(&frame.to_le_bytes(), 16000);
        assert_eq!(frame, decoded);
    }

    #[test]
    fn test_chunker_emits_fixed_frames() {
        let mut chunker = FrameChunker::new(4);
        assert!(chunker.push(&[0.1, 0.2]).is_empty());
        assert_eq!(chunker.pending_len(), 2);

        let frames = chunker.push(&[0.3, 0.4, 0.5]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(chunker.pending_len(), 1);
    }

    #[test]
    fn test_chunker_emits_multiple_frames_at_once() {
        let mut chunker = FrameChunker::new(2);
        let frames = chunker.push(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(frames, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(chunker.pending_len(), 1);
    }

    #[test]
    fn test_chunker_preserves_order_across_pushes() {
        let mut chunker = FrameChunker::new(3);
        let mut out = Vec::new();
        for batch in [[0.0f32, 1.0].as_slice(), &[2.0], &[3.0, 4.0, 5.0]] {
            out.extend(chunker.push(batch));
        }
        assert_eq!(out, vec![vec![0.0, 1.0, 2.0], vec![3.0, 4.0, 5.0]]);
    }
}
