//! Gemini Live API configuration constants and model selection.

use serde::{Deserialize, Serialize};

/// Gemini Live API WebSocket endpoint (BidiGenerateContent).
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

/// Sample rate of audio sent to the API (Hz, mono PCM16LE).
pub const GEMINI_LIVE_INPUT_SAMPLE_RATE: u32 = 16000;

/// Sample rate of audio received from the API (Hz, mono PCM16LE).
pub const GEMINI_LIVE_OUTPUT_SAMPLE_RATE: u32 = 24000;

// =============================================================================
// Models
// =============================================================================

/// Supported Gemini Live native-audio models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeminiLiveModel {
    /// September 2025 native-audio preview (default)
    #[default]
    #[serde(rename = "models/gemini-2.5-flash-native-audio-preview-09-2025")]
    Flash25NativeAudioPreview0925,
    /// December 2025 native-audio preview
    #[serde(rename = "models/gemini-2.5-flash-native-audio-preview-12-2025")]
    Flash25NativeAudioPreview1225,
}

impl GeminiLiveModel {
    /// The fully qualified model name used on the wire.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flash25NativeAudioPreview0925 => {
                "models/gemini-2.5-flash-native-audio-preview-09-2025"
            }
            Self::Flash25NativeAudioPreview1225 => {
                "models/gemini-2.5-flash-native-audio-preview-12-2025"
            }
        }
    }

    /// Parse from string, with fallback to default. Accepts names with or
    /// without the `models/` prefix.
    pub fn from_str_or_default(s: &str) -> Self {
        let name = s.trim().strip_prefix("models/").unwrap_or(s.trim());
        match name.to_lowercase().as_str() {
            "gemini-2.5-flash-native-audio-preview-09-2025" => {
                Self::Flash25NativeAudioPreview0925
            }
            "gemini-2.5-flash-native-audio-preview-12-2025" => {
                Self::Flash25NativeAudioPreview1225
            }
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for GeminiLiveModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
