//! Gemini Live API integration.
//!
//! Full-duplex voice over a single WebSocket: the client streams
//! microphone PCM16 up and receives synthesized PCM16 plus transcription
//! and turn events down.
//!
//! # Modules
//!
//! - [`client`] - WebSocket session lifecycle and dispatch
//! - [`messages`] - wire message types and event classification
//! - [`config`] - endpoint, sample rates, model selection

pub mod client;
pub mod config;
pub mod messages;

pub use client::GeminiLive;
pub use config::{
    GEMINI_LIVE_INPUT_SAMPLE_RATE, GEMINI_LIVE_OUTPUT_SAMPLE_RATE, GEMINI_LIVE_URL,
    GeminiLiveModel,
};
pub use messages::{ClientMessage, RealtimeInput, ServerEvent, ServerMessage, Setup};
