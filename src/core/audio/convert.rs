//! PCM sample format conversion.
//!
//! The Gemini Live API speaks 16-bit signed little-endian PCM on both
//! directions of the wire, while capture and playback devices work in
//! normalized `f32`. These helpers convert between the two, element-wise.

/// Scale factor for converting i16 PCM samples to normalized f32.
pub const PCM_TO_FLOAT_SCALE: f32 = 1.0 / 32768.0;

/// Scale factor for converting normalized f32 samples to i16 PCM.
pub const FLOAT_TO_PCM_SCALE: f32 = 32767.0;

/// Convert a normalized float sample to a 16-bit PCM sample.
///
/// Input is clamped to `[-1.0, 1.0]` before scaling, so out-of-range
/// samples saturate instead of wrapping.
#[inline]
pub fn float_to_int16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * FLOAT_TO_PCM_SCALE) as i16
}

/// Convert a 16-bit PCM sample to a normalized float sample.
///
/// Divides by 32768 per 16-bit PCM convention; the mapping is slightly
/// asymmetric around zero (i16::MAX maps just below 1.0).
#[inline]
pub fn int16_to_float(sample: i16) -> f32 {
    sample as f32 * PCM_TO_FLOAT_SCALE
}

/// Convert a frame of normalized float samples to i16 PCM.
/// Output length equals input length.
pub fn float_frame_to_int16(samples: &[f32]) -> Vec<i16> {
    samples.iter().copied().map(float_to_int16).collect()
}

/// Convert a frame of i16 PCM samples to normalized floats.
/// Output length equals input length.
pub fn int16_frame_to_float(samples: &[i16]) -> Vec<f32> {
    samples.iter().copied().map(int16_to_float).collect()
}
