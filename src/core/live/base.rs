//! Shared types for the Live API transport session.
//!
//! Defines the connection state machine, the error taxonomy, the
//! configuration carried into a session, and the callback seams through
//! which inbound audio and observable events reach the owner.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::audio::AudioFrame;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during transport operations.
#[derive(Debug, Error)]
pub enum LiveError {
    /// Connection to the API failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Missing or rejected credential
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type for transport operations.
pub type LiveResult<T> = Result<T, LiveError>;

// =============================================================================
// Session State
// =============================================================================

/// Transport session lifecycle.
///
/// `AwaitingSetupAck` covers the window between the Setup message going out
/// and the server's first acknowledgment; audio sent in that window is
/// intentionally dropped rather than queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No socket open
    Disconnected,
    /// Socket opening
    Connecting,
    /// Setup sent, waiting for the first acknowledgment
    AwaitingSetupAck,
    /// Handshake complete; audio flows both ways
    Active,
    /// Torn down; terminal
    Closed,
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a transport session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Opaque credential, never parsed, held only for this session
    pub api_key: String,

    /// Model identifier (e.g. "models/gemini-2.5-flash-native-audio-preview-09-2025")
    #[serde(default)]
    pub model: String,

    /// System instruction text sent in the Setup message
    #[serde(default)]
    pub system_instruction: String,

    /// WebSocket endpoint; defaults to the Gemini Live URL
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Request transcription of model audio output
    #[serde(default = "default_true")]
    pub output_transcription: bool,

    /// Request transcription of user audio input
    #[serde(default = "default_true")]
    pub input_transcription: bool,

    /// Let the model decide when to speak proactively
    #[serde(default = "default_true")]
    pub proactive_audio: bool,

    /// Socket connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: String::new(),
            system_instruction: String::new(),
            endpoint: None,
            output_transcription: true,
            input_transcription: true,
            proactive_audio: true,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl LiveConfig {
    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

// =============================================================================
// Observable Events
// =============================================================================

/// Direction of a transcription event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptDirection {
    /// Transcription of the user's microphone audio
    Input,
    /// Transcription of the model's synthesized audio
    Output,
}

impl std::fmt::Display for TranscriptDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Turn and generation lifecycle signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnSignal {
    /// The model finished generating the current response
    GenerationComplete,
    /// The current conversational turn ended
    TurnComplete,
    /// The model was interrupted by the user speaking
    Interrupted,
}

/// Token accounting reported by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageReport {
    pub prompt_tokens: u64,
    pub response_tokens: u64,
    pub total_tokens: u64,
}

/// Non-audio events surfaced to the session owner.
///
/// None of these alter transport state; they exist to be observed
/// (logged, displayed, accumulated).
#[derive(Debug, Clone)]
pub enum LiveEvent {
    /// A transcription fragment for one direction of the conversation
    Transcript {
        direction: TranscriptDirection,
        text: String,
    },
    /// A turn/generation lifecycle signal
    Turn(TurnSignal),
    /// Token usage accounting
    Usage(UsageReport),
    /// A message or message part the client does not recognize; never fatal
    Unhandled(serde_json::Value),
    /// The socket closed or errored; the session is over
    TransportClosed,
}

// =============================================================================
// Callbacks
// =============================================================================

/// Callback invoked with each decoded inbound audio frame.
pub type AudioCallback =
    Arc<dyn Fn(AudioFrame) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback invoked with each observable non-audio event.
pub type EventCallback =
    Arc<dyn Fn(LiveEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;
