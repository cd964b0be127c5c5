//! Gemini Live API WebSocket message types.
//!
//! All messages are JSON-framed. Client messages carry exactly one
//! top-level key (`setup` or `realtimeInput`). Server messages carry
//! mutually exclusive top-level keys, except `usageMetadata`, which can
//! ride alongside a `turnComplete` signal.
//!
//! Client messages (sent to server):
//! - `setup` - session parameters, sent once after the socket opens
//! - `realtimeInput` - one base64 PCM16LE microphone frame
//!
//! Server messages (received from server):
//! - `setupResponse` / `setupComplete` - handshake acknowledgments
//! - `serverContent.modelTurn.parts[].inlineData` - synthesized audio
//! - `serverContent.generationComplete` / `turnComplete` / `interrupted`
//! - `serverContent.outputTranscription` / `inputTranscription`
//! - `usageMetadata` - token accounting

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::audio::encode_pcm16le;
use crate::core::live::base::{TranscriptDirection, TurnSignal, UsageReport};

// =============================================================================
// Client Messages (sent to server)
// =============================================================================

/// Messages sent to the Gemini Live API.
#[derive(Debug, Clone, Serialize)]
pub enum ClientMessage {
    /// Session setup; the first and only handshake message
    #[serde(rename = "setup")]
    Setup(Setup),

    /// One frame of microphone audio
    #[serde(rename = "realtimeInput")]
    RealtimeInput(RealtimeInput),
}

/// Session parameters carried in the setup message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    /// Fully qualified model name
    pub model: String,

    /// Generation parameters
    pub generation_config: GenerationConfig,

    /// Request transcription of model audio; presence of the empty object
    /// enables it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<EmptyObject>,

    /// Request transcription of user audio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<EmptyObject>,

    /// System instruction supplied by the caller
    pub system_instruction: SystemInstruction,

    /// Proactive audio settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proactivity: Option<Proactivity>,
}

/// Generation parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Requested response media ("AUDIO")
    pub response_modalities: Vec<String>,
}

/// An intentionally empty JSON object; presence alone carries meaning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyObject {}

/// System instruction payload.
#[derive(Debug, Clone, Serialize)]
pub struct SystemInstruction {
    pub parts: Vec<TextPart>,
}

/// A text content part.
#[derive(Debug, Clone, Serialize)]
pub struct TextPart {
    pub text: String,
}

/// Proactivity settings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Proactivity {
    pub proactive_audio: bool,
}

/// One microphone frame on its way to the server.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeInput {
    pub audio: AudioBlob,
}

/// Base64-embedded PCM payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioBlob {
    /// Base64 PCM16LE samples
    pub data: String,
    /// Always "audio/pcm"
    pub mime_type: String,
}

impl RealtimeInput {
    /// Wrap PCM16 samples as a base64 realtime-input payload.
    pub fn pcm16(samples: &[i16]) -> Self {
        Self {
            audio: AudioBlob {
                data: BASE64_STANDARD.encode(encode_pcm16le(samples)),
                mime_type: "audio/pcm".to_string(),
            },
        }
    }
}

// =============================================================================
// Server Messages (received from server)
// =============================================================================

/// Raw inbound message shape.
///
/// Unknown top-level keys collect in `unknown` so nothing is silently
/// dropped; [`ServerMessage::into_events`] classifies the whole message
/// into the [`ServerEvent`] union.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerMessage {
    pub setup_response: Option<Value>,
    pub setup_complete: Option<Value>,
    pub server_content: Option<ServerContent>,
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(flatten)]
    pub unknown: serde_json::Map<String, Value>,
}

/// Content portion of an inbound message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerContent {
    pub model_turn: Option<ModelTurn>,
    pub generation_complete: Option<bool>,
    pub turn_complete: Option<bool>,
    pub interrupted: Option<bool>,
    pub output_transcription: Option<Transcription>,
    pub input_transcription: Option<Transcription>,
    #[serde(flatten)]
    pub unknown: serde_json::Map<String, Value>,
}

/// A model turn carrying zero or more content parts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One content part of a model turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Part {
    pub inline_data: Option<InlineData>,
    pub text: Option<String>,
}

/// Inline binary payload, base64 encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// A transcription fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: Option<String>,
}

/// Token accounting as reported on the wire.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageMetadata {
    pub prompt_token_count: u64,
    pub response_token_count: u64,
    pub total_token_count: u64,
}

impl From<UsageMetadata> for UsageReport {
    fn from(u: UsageMetadata) -> Self {
        Self {
            prompt_tokens: u.prompt_token_count,
            response_tokens: u.response_token_count,
            total_tokens: u.total_token_count,
        }
    }
}

// =============================================================================
// Classification
// =============================================================================

/// One inbound message classified into discrete events.
///
/// A single wire message can yield several events (multiple audio parts,
/// a turn signal plus usage). Anything unrecognized becomes `Unhandled`;
/// no inbound message is ever fatal.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Handshake acknowledgment; the first one activates the session
    SetupAck(Value),
    /// One base64 PCM16LE audio payload, in part order
    Audio { data: String },
    /// A transcription fragment
    Transcript {
        direction: TranscriptDirection,
        text: String,
    },
    /// A turn/generation lifecycle signal
    Turn(TurnSignal),
    /// Token accounting
    Usage(UsageReport),
    /// Anything the client does not recognize
    Unhandled(Value),
}

impl ServerMessage {
    /// Classify this message into zero or more events, preserving the
    /// order audio parts appear in.
    pub fn into_events(self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        let recognized_top_level = self.setup_response.is_some()
            || self.setup_complete.is_some()
            || self.server_content.is_some()
            || self.usage_metadata.is_some();

        if let Some(ack) = self.setup_response {
            events.push(ServerEvent::SetupAck(ack));
        }
        if let Some(ack) = self.setup_complete {
            events.push(ServerEvent::SetupAck(ack));
        }

        if let Some(content) = self.server_content {
            let mut recognized_content = false;

            if let Some(turn) = &content.model_turn {
                recognized_content = true;
                for part in &turn.parts {
                    if let Some(inline) = &part.inline_data {
                        events.push(ServerEvent::Audio {
                            data: inline.data.clone(),
                        });
                    }
                }
            }

            if content.generation_complete.unwrap_or(false) {
                recognized_content = true;
                events.push(ServerEvent::Turn(TurnSignal::GenerationComplete));
            }
            if content.turn_complete.unwrap_or(false) {
                recognized_content = true;
                events.push(ServerEvent::Turn(TurnSignal::TurnComplete));
            }
            if content.interrupted.unwrap_or(false) {
                recognized_content = true;
                events.push(ServerEvent::Turn(TurnSignal::Interrupted));
            }

            for (transcription, direction) in [
                (&content.output_transcription, TranscriptDirection::Output),
                (&content.input_transcription, TranscriptDirection::Input),
            ] {
                if let Some(t) = transcription {
                    match t.text.as_deref() {
                        Some(text) if !text.is_empty() => {
                            recognized_content = true;
                            events.push(ServerEvent::Transcript {
                                direction,
                                text: text.to_string(),
                            });
                        }
                        // An empty transcription object is observable but
                        // carries nothing actionable.
                        _ => {
                            events.push(ServerEvent::Unhandled(
                                serde_json::to_value(t).unwrap_or(Value::Null),
                            ));
                        }
                    }
                }
            }

            if !recognized_content {
                events.push(ServerEvent::Unhandled(
                    serde_json::to_value(&content).unwrap_or(Value::Null),
                ));
            }
        }

        if let Some(usage) = self.usage_metadata {
            events.push(ServerEvent::Usage(usage.into()));
        }

        if !recognized_top_level {
            events.push(ServerEvent::Unhandled(Value::Object(self.unknown)));
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_message_shape() {
        let msg = ClientMessage::Setup(Setup {
            model: "models/gemini-2.5-flash-native-audio-preview-09-2025".to_string(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
            },
            output_audio_transcription: Some(EmptyObject {}),
            input_audio_transcription: Some(EmptyObject {}),
            system_instruction: SystemInstruction {
                parts: vec![TextPart {
                    text: "Be brief.".to_string(),
                }],
            },
            proactivity: Some(Proactivity {
                proactive_audio: true,
            }),
        });

        let json: Value = serde_json::to_value(&msg).unwrap();
        let setup = &json["setup"];
        assert_eq!(
            setup["model"],
            "models/gemini-2.5-flash-native-audio-preview-09-2025"
        );
        assert_eq!(setup["generationConfig"]["responseModalities"][0], "AUDIO");
        assert!(setup["outputAudioTranscription"].is_object());
        assert!(setup["inputAudioTranscription"].is_object());
        assert_eq!(setup["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(setup["proactivity"]["proactiveAudio"], true);
    }

    #[test]
    fn test_realtime_input_encodes_base64_pcm16le() {
        let msg = ClientMessage::RealtimeInput(RealtimeInput::pcm16(&[0x1234, -2]));
        let json: Value = serde_json::to_value(&msg).unwrap();
        let audio = &json["realtimeInput"]["audio"];
        assert_eq!(audio["mimeType"], "audio/pcm");

        let decoded = BASE64_STANDARD
            .decode(audio["data"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, vec![0x34, 0x12, 0xFE, 0xFF]);
    }

    #[test]
    fn test_setup_complete_classifies_as_ack() {
        let msg: ServerMessage = serde_json::from_str(r#"{"setupComplete": {}}"#).unwrap();
        let events = msg.into_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ServerEvent::SetupAck(_)));
    }

    #[test]
    fn test_two_inline_audio_parts_in_order() {
        let msg: ServerMessage = serde_json::from_str(
            r#"{"serverContent": {"modelTurn": {"parts": [
                {"inlineData": {"data": "QUFB", "mimeType": "audio/pcm"}},
                {"inlineData": {"data": "QkJC"}}
            ]}}}"#,
        )
        .unwrap();

        let events = msg.into_events();
        assert_eq!(events.len(), 2);
        match (&events[0], &events[1]) {
            (ServerEvent::Audio { data: a }, ServerEvent::Audio { data: b }) => {
                assert_eq!(a, "QUFB");
                assert_eq!(b, "QkJC");
            }
            other => panic!("expected two audio events, got {other:?}"),
        }
    }

    #[test]
    fn test_turn_complete_with_usage() {
        let msg: ServerMessage = serde_json::from_str(
            r#"{"serverContent": {"turnComplete": true},
                "usageMetadata": {"promptTokenCount": 10, "responseTokenCount": 20, "totalTokenCount": 30}}"#,
        )
        .unwrap();

        let events = msg.into_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            ServerEvent::Turn(TurnSignal::TurnComplete)
        ));
        match &events[1] {
            ServerEvent::Usage(usage) => {
                assert_eq!(usage.prompt_tokens, 10);
                assert_eq!(usage.response_tokens, 20);
                assert_eq!(usage.total_tokens, 30);
            }
            other => panic!("expected usage event, got {other:?}"),
        }
    }

    #[test]
    fn test_interrupted_and_generation_complete() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"serverContent": {"interrupted": true}}"#).unwrap();
        assert!(matches!(
            msg.into_events()[0],
            ServerEvent::Turn(TurnSignal::Interrupted)
        ));

        let msg: ServerMessage =
            serde_json::from_str(r#"{"serverContent": {"generationComplete": true}}"#).unwrap();
        assert!(matches!(
            msg.into_events()[0],
            ServerEvent::Turn(TurnSignal::GenerationComplete)
        ));
    }

    #[test]
    fn test_transcriptions_carry_direction() {
        let msg: ServerMessage = serde_json::from_str(
            r#"{"serverContent": {"outputTranscription": {"text": "hello"}}}"#,
        )
        .unwrap();
        match &msg.into_events()[0] {
            ServerEvent::Transcript { direction, text } => {
                assert_eq!(*direction, TranscriptDirection::Output);
                assert_eq!(text, "hello");
            }
            other => panic!("expected transcript, got {other:?}"),
        }

        let msg: ServerMessage =
            serde_json::from_str(r#"{"serverContent": {"inputTranscription": {"text": "hi"}}}"#)
                .unwrap();
        assert!(matches!(
            &msg.into_events()[0],
            ServerEvent::Transcript {
                direction: TranscriptDirection::Input,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_transcription_is_unhandled() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"serverContent": {"outputTranscription": {}}}"#).unwrap();
        let events = msg.into_events();
        assert!(matches!(events[0], ServerEvent::Unhandled(_)));
    }

    #[test]
    fn test_unknown_top_level_is_unhandled() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"somethingNew": {"x": 1}}"#).unwrap();
        let events = msg.into_events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            ServerEvent::Unhandled(value) => assert!(value.get("somethingNew").is_some()),
            other => panic!("expected unhandled, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_server_content_is_unhandled() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"serverContent": {"futureField": true}}"#).unwrap();
        let events = msg.into_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ServerEvent::Unhandled(_)));
    }

    #[test]
    fn test_part_without_inline_data_yields_no_audio() {
        let msg: ServerMessage = serde_json::from_str(
            r#"{"serverContent": {"modelTurn": {"parts": [{"text": "thinking"}]}}}"#,
        )
        .unwrap();
        assert!(msg.into_events().is_empty());
    }
}
