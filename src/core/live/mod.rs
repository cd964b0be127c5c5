//! Live transport layer: shared session types and the Gemini provider.

pub mod base;
pub mod gemini;

pub use base::{
    AudioCallback, EventCallback, LiveConfig, LiveError, LiveEvent, LiveResult, SessionState,
    TranscriptDirection, TurnSignal, UsageReport,
};
pub use gemini::GeminiLive;
