//! Gemini Live API client.
//!
//! Owns the full-duplex WebSocket session: connect, setup handshake,
//! inbound dispatch, outbound frame send, teardown.
//!
//! # API Reference
//!
//! - Endpoint: `wss://generativelanguage.googleapis.com/ws/...BidiGenerateContent?key=<key>`
//! - Protocol: WebSocket with JSON messages
//! - Audio: PCM 16-bit little-endian, base64 encoded; 16 kHz up, 24 kHz down
//!
//! # Thread Safety
//!
//! All mutable state sits behind `Arc` wrappers shared with the spawned
//! connection task; the `active` flag is an `AtomicBool` for lock-free
//! checks on the hot send path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use base64::prelude::*;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use zeroize::Zeroize;

use super::config::{GEMINI_LIVE_OUTPUT_SAMPLE_RATE, GEMINI_LIVE_URL, GeminiLiveModel};
use super::messages::{
    ClientMessage, EmptyObject, GenerationConfig, Proactivity, RealtimeInput, ServerEvent,
    ServerMessage, Setup, SystemInstruction, TextPart,
};
use crate::core::audio::AudioFrame;
use crate::core::live::base::{
    AudioCallback, EventCallback, LiveConfig, LiveError, LiveEvent, LiveResult, SessionState,
    TurnSignal,
};

/// Channel capacity for outbound WebSocket messages.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Time allowed for the connection task to flush the close frame before
/// it is aborted.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Commands flowing into the connection task.
enum Outbound {
    /// A JSON message to serialize and send
    Message(ClientMessage),
    /// Send a WebSocket close frame and end the task
    Close,
}

/// Gemini Live transport session.
///
/// Lifecycle: Disconnected → Connecting → AwaitingSetupAck → Active →
/// Closed. Audio frames are only transmitted while Active; frames offered
/// earlier are silently dropped (capture may start fractionally before
/// the handshake completes, by design).
pub struct GeminiLive {
    /// Configuration
    config: LiveConfig,
    /// Parsed model
    model: GeminiLiveModel,
    /// Session state
    state: Arc<RwLock<SessionState>>,
    /// Fast-path flag: true only while state == Active
    active: Arc<AtomicBool>,
    /// Outbound command channel into the connection task
    ws_sender: Arc<Mutex<Option<mpsc::Sender<Outbound>>>>,
    /// Inbound decoded-audio callback
    audio_callback: Arc<Mutex<Option<AudioCallback>>>,
    /// Observable-event callback
    event_callback: Arc<Mutex<Option<EventCallback>>>,
    /// Connection task handle
    connection_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl GeminiLive {
    /// Create a session from configuration. Fails if the credential is
    /// empty; nothing is transmitted until [`GeminiLive::connect`].
    pub fn new(config: LiveConfig) -> LiveResult<Self> {
        if config.api_key.is_empty() {
            return Err(LiveError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        let model = if config.model.is_empty() {
            GeminiLiveModel::default()
        } else {
            GeminiLiveModel::from_str_or_default(&config.model)
        };

        Ok(Self {
            config,
            model,
            state: Arc::new(RwLock::new(SessionState::Disconnected)),
            active: Arc::new(AtomicBool::new(false)),
            ws_sender: Arc::new(Mutex::new(None)),
            audio_callback: Arc::new(Mutex::new(None)),
            event_callback: Arc::new(Mutex::new(None)),
            connection_handle: Arc::new(Mutex::new(None)),
        })
    }

    /// The configured model.
    pub fn model(&self) -> GeminiLiveModel {
        self.model
    }

    /// Current session state.
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Whether the handshake completed and audio may flow.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Register the callback receiving decoded inbound audio frames.
    pub fn on_audio(&self, callback: AudioCallback) {
        if let Ok(mut guard) = self.audio_callback.try_lock() {
            *guard = Some(callback);
        } else {
            let cb = self.audio_callback.clone();
            tokio::spawn(async move {
                *cb.lock().await = Some(callback);
            });
        }
    }

    /// Register the callback receiving observable events.
    pub fn on_event(&self, callback: EventCallback) {
        if let Ok(mut guard) = self.event_callback.try_lock() {
            *guard = Some(callback);
        } else {
            let cb = self.event_callback.clone();
            tokio::spawn(async move {
                *cb.lock().await = Some(callback);
            });
        }
    }

    /// Build the WebSocket URL with the credential as query parameter.
    /// Never logged: it carries the key.
    pub(crate) fn build_ws_url(&self) -> String {
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .unwrap_or(GEMINI_LIVE_URL);
        format!("{}?key={}", endpoint, self.config.api_key)
    }

    /// Build the one-shot setup message.
    pub(crate) fn build_setup(&self) -> Setup {
        Setup {
            model: self.model.as_str().to_string(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
            },
            output_audio_transcription: self
                .config
                .output_transcription
                .then(|| EmptyObject {}),
            input_audio_transcription: self.config.input_transcription.then(|| EmptyObject {}),
            system_instruction: SystemInstruction {
                parts: vec![TextPart {
                    text: self.config.system_instruction.clone(),
                }],
            },
            proactivity: self.config.proactive_audio.then(|| Proactivity {
                proactive_audio: true,
            }),
        }
    }

    /// Open the socket, send the setup message, and start the dispatch
    /// loop. Returns once the socket is open; activation happens when the
    /// server acknowledges the setup.
    pub async fn connect(&self) -> LiveResult<()> {
        {
            let state = self.state.read().await;
            // Connect is single-shot: a closed or already-connecting
            // client never silently pretends to have reconnected.
            if !matches!(*state, SessionState::Disconnected) {
                return Err(LiveError::ConnectionFailed(format!(
                    "cannot connect from {:?} state",
                    *state
                )));
            }
        }
        *self.state.write().await = SessionState::Connecting;

        let url = self.build_ws_url();
        let connected =
            tokio::time::timeout(self.config.connect_timeout(), async {
                tokio_tungstenite::connect_async(url.as_str()).await
            })
            .await;

        let ws = match connected {
            Err(_) => {
                *self.state.write().await = SessionState::Disconnected;
                return Err(LiveError::Timeout(format!(
                    "connect exceeded {}ms",
                    self.config.connect_timeout_ms
                )));
            }
            Ok(Err(e)) => {
                *self.state.write().await = SessionState::Disconnected;
                return Err(LiveError::ConnectionFailed(e.to_string()));
            }
            Ok(Ok((ws, _response))) => ws,
        };

        tracing::info!(model = %self.model, "Connected to Gemini Live API");

        let (mut ws_sink, mut ws_stream) = ws.split();

        let (tx, mut rx) = mpsc::channel::<Outbound>(WS_CHANNEL_CAPACITY);
        // The setup message goes through the same channel ahead of any
        // audio, so ordering on the wire is guaranteed.
        tx.send(Outbound::Message(ClientMessage::Setup(self.build_setup())))
            .await
            .map_err(|_| LiveError::WebSocketError("send channel closed".to_string()))?;
        *self.ws_sender.lock().await = Some(tx);
        *self.state.write().await = SessionState::AwaitingSetupAck;

        let state = self.state.clone();
        let active = self.active.clone();
        let ws_sender = self.ws_sender.clone();
        let audio_cb = self.audio_callback.clone();
        let event_cb = self.event_callback.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    // Outbound commands
                    Some(command) = rx.recv() => match command {
                        Outbound::Message(message) => {
                            let json = match serde_json::to_string(&message) {
                                Ok(j) => j,
                                Err(e) => {
                                    tracing::error!("Failed to serialize message: {e}");
                                    continue;
                                }
                            };
                            if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                                tracing::error!("Failed to send WebSocket message: {e}");
                                break;
                            }
                        }
                        Outbound::Close => {
                            // Graceful shutdown: tell the peer before the
                            // socket goes away.
                            let _ = ws_sink.send(Message::Close(None)).await;
                            break;
                        }
                    },

                    // Inbound messages
                    Some(message) = ws_stream.next() => {
                        match message {
                            Ok(Message::Text(text)) => {
                                Self::dispatch(text.as_str(), &state, &active, &audio_cb, &event_cb).await;
                            }
                            Ok(Message::Binary(data)) => {
                                // The transport may deliver JSON as a binary
                                // blob; decode it as text first.
                                match std::str::from_utf8(&data) {
                                    Ok(text) => {
                                        Self::dispatch(text, &state, &active, &audio_cb, &event_cb).await;
                                    }
                                    Err(e) => {
                                        tracing::warn!("Binary frame is not UTF-8 text: {e}");
                                    }
                                }
                            }
                            Ok(Message::Ping(data)) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    tracing::error!("Failed to send pong: {e}");
                                }
                            }
                            Ok(Message::Close(_)) => {
                                tracing::info!("WebSocket closed by server");
                                break;
                            }
                            Err(e) => {
                                tracing::error!("WebSocket error: {e}");
                                break;
                            }
                            _ => {}
                        }
                    }

                    else => break,
                }
            }

            active.store(false, Ordering::SeqCst);
            *state.write().await = SessionState::Closed;
            *ws_sender.lock().await = None;
            if let Some(cb) = event_cb.lock().await.as_ref() {
                cb(LiveEvent::TransportClosed).await;
            }
            tracing::info!("Gemini Live connection task ended");
        });

        *self.connection_handle.lock().await = Some(handle);
        Ok(())
    }

    /// Handle one inbound JSON message. Parse failures are logged and
    /// skipped; a malformed message never ends the session.
    async fn dispatch(
        text: &str,
        state: &Arc<RwLock<SessionState>>,
        active: &Arc<AtomicBool>,
        audio_cb: &Arc<Mutex<Option<AudioCallback>>>,
        event_cb: &Arc<Mutex<Option<EventCallback>>>,
    ) {
        let message: ServerMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Failed to parse server message: {e}");
                return;
            }
        };

        for event in message.into_events() {
            match event {
                ServerEvent::SetupAck(ack) => {
                    let mut st = state.write().await;
                    if *st == SessionState::AwaitingSetupAck {
                        *st = SessionState::Active;
                        active.store(true, Ordering::SeqCst);
                        tracing::info!("Setup acknowledged, session active");
                    } else {
                        tracing::debug!(ack = %ack, "Additional setup acknowledgment");
                    }
                }

                ServerEvent::Audio { data } => match BASE64_STANDARD.decode(&data) {
                    Ok(bytes) => {
                        let frame =
                            AudioFrame::from_le_bytes(&bytes, GEMINI_LIVE_OUTPUT_SAMPLE_RATE);
                        if let Some(cb) = audio_cb.lock().await.as_ref() {
                            cb(frame).await;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to decode inline audio payload: {e}");
                    }
                },

                ServerEvent::Transcript { direction, text } => {
                    tracing::debug!(%direction, text, "Transcription");
                    Self::emit(event_cb, LiveEvent::Transcript { direction, text }).await;
                }

                ServerEvent::Turn(signal) => {
                    if signal == TurnSignal::Interrupted {
                        tracing::info!("Model interrupted");
                    } else {
                        tracing::debug!(?signal, "Turn signal");
                    }
                    Self::emit(event_cb, LiveEvent::Turn(signal)).await;
                }

                ServerEvent::Usage(usage) => {
                    tracing::debug!(
                        prompt = usage.prompt_tokens,
                        response = usage.response_tokens,
                        total = usage.total_tokens,
                        "Usage report"
                    );
                    Self::emit(event_cb, LiveEvent::Usage(usage)).await;
                }

                ServerEvent::Unhandled(value) => {
                    tracing::debug!(message = %value, "Unhandled server message");
                    Self::emit(event_cb, LiveEvent::Unhandled(value)).await;
                }
            }
        }
    }

    async fn emit(event_cb: &Arc<Mutex<Option<EventCallback>>>, event: LiveEvent) {
        if let Some(cb) = event_cb.lock().await.as_ref() {
            cb(event).await;
        }
    }

    /// Send one capture frame. Best-effort: while the session is not
    /// Active the frame is dropped silently, with no error.
    pub async fn send_audio_frame(&self, frame: &AudioFrame) -> LiveResult<()> {
        if !self.is_active() {
            tracing::trace!("Transport not active, dropping capture frame");
            return Ok(());
        }

        let sender = self.ws_sender.lock().await.clone();
        match sender {
            Some(tx) => tx
                .send(Outbound::Message(ClientMessage::RealtimeInput(
                    RealtimeInput::pcm16(frame.samples()),
                )))
                .await
                .map_err(|_| LiveError::WebSocketError("connection task ended".to_string())),
            // Raced with teardown; treat like the not-active case.
            None => Ok(()),
        }
    }

    /// Tear the session down from any state. Idempotent; releases the
    /// socket and stops the dispatch loop.
    pub async fn close(&self) {
        let was_closed = {
            let mut st = self.state.write().await;
            let was = *st == SessionState::Closed;
            *st = SessionState::Closed;
            was
        };

        self.active.store(false, Ordering::SeqCst);

        // Ask the connection task to send a close frame and wind down;
        // abort only if it does not finish within the grace period.
        let sender = self.ws_sender.lock().await.take();
        if let Some(tx) = sender {
            let _ = tx.send(Outbound::Close).await;
        }
        let handle = self.connection_handle.lock().await.take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(CLOSE_GRACE, &mut handle).await.is_err() {
                handle.abort();
            }
        }

        if !was_closed {
            tracing::info!("Gemini Live session closed");
        }
    }
}

/// Zeroize the credential when the client is dropped.
impl Drop for GeminiLive {
    fn drop(&mut self) {
        self.config.api_key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> LiveConfig {
        LiveConfig {
            api_key: "test-key".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_requires_api_key() {
        let result = GeminiLive::new(LiveConfig::default());
        assert!(matches!(result, Err(LiveError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn test_starts_disconnected_and_inactive() {
        let live = GeminiLive::new(test_config()).unwrap();
        assert_eq!(live.state().await, SessionState::Disconnected);
        assert!(!live.is_active());
    }

    #[tokio::test]
    async fn test_send_before_active_is_silent_noop() {
        let live = GeminiLive::new(test_config()).unwrap();
        let frame = AudioFrame::new(vec![1, 2, 3], 16000);
        // Never connected: no transmission, no error.
        live.send_audio_frame(&frame).await.unwrap();
        assert_eq!(live.state().await, SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_from_any_state() {
        let live = GeminiLive::new(test_config()).unwrap();
        live.close().await;
        assert_eq!(live.state().await, SessionState::Closed);
        live.close().await;
        assert_eq!(live.state().await, SessionState::Closed);

        // Best-effort send still holds after close.
        let frame = AudioFrame::new(vec![0], 16000);
        live.send_audio_frame(&frame).await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_after_close_is_rejected() {
        let live = GeminiLive::new(test_config()).unwrap();
        live.close().await;
        match live.connect().await {
            Err(LiveError::ConnectionFailed(_)) => {}
            other => panic!("expected connection failure, got {other:?}"),
        }
        assert_eq!(live.state().await, SessionState::Closed);
    }

    #[test]
    fn test_ws_url_carries_credential() {
        let live = GeminiLive::new(test_config()).unwrap();
        let url = live.build_ws_url();
        assert!(url.starts_with(GEMINI_LIVE_URL));
        assert!(url.ends_with("?key=test-key"));
    }

    #[test]
    fn test_setup_respects_transcription_flags() {
        let live = GeminiLive::new(LiveConfig {
            api_key: "k".to_string(),
            output_transcription: true,
            input_transcription: false,
            proactive_audio: false,
            ..Default::default()
        })
        .unwrap();

        let setup = live.build_setup();
        assert!(setup.output_audio_transcription.is_some());
        assert!(setup.input_audio_transcription.is_none());
        assert!(setup.proactivity.is_none());
        assert_eq!(setup.generation_config.response_modalities, vec!["AUDIO"]);
    }

    #[test]
    fn test_setup_uses_default_model_when_unset() {
        let live = GeminiLive::new(test_config()).unwrap();
        assert_eq!(
            live.build_setup().model,
            "models/gemini-2.5-flash-native-audio-preview-09-2025"
        );
    }
}
