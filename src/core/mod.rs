pub mod audio;
pub mod live;

// Re-export commonly used types for convenience
pub use audio::{
    AudioFrame, CaptureConfig, CaptureError, CaptureSource, CpalSink, FrameChunker, PlaybackError,
    PlaybackQueue, PlaybackSink, PlaybackState,
};

pub use live::{
    GeminiLive, LiveConfig, LiveError, LiveEvent, LiveResult, SessionState, TranscriptDirection,
    TurnSignal, UsageReport,
};
