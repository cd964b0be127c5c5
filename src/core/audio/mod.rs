//! Real-time audio pipeline: sample conversion, framing, capture, and
//! ordered playback.

pub mod capture;
pub mod convert;
pub mod frame;
pub mod playback;

pub use capture::{CaptureConfig, CaptureError, CaptureSource};
pub use convert::{float_frame_to_int16, float_to_int16, int16_frame_to_float, int16_to_float};
pub use frame::{AudioFrame, FrameChunker, decode_pcm16le, encode_pcm16le};
pub use playback::{CpalSink, PlaybackError, PlaybackQueue, PlaybackSink, PlaybackState};
