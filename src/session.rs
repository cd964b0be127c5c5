//! Voice session aggregate.
//!
//! A [`Session`] owns one microphone capture source, one Gemini Live
//! transport, and one playback queue, and wires them together: capture
//! frames flow up through a bounded channel and a send task; inbound
//! audio frames land in the playback queue; non-audio events feed usage
//! accounting and the interrupt flush.
//!
//! `start`/`stop` are the whole lifecycle. Stop is idempotent and tears
//! everything down in order regardless of how far start got.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

use crate::config::{AppConfig, DEFAULT_CAPTURE_FRAME_SAMPLES};
use crate::core::audio::{
    CaptureConfig, CaptureError, CaptureSource, CpalSink, PlaybackError, PlaybackQueue,
};
use crate::core::live::gemini::{GEMINI_LIVE_INPUT_SAMPLE_RATE, GEMINI_LIVE_OUTPUT_SAMPLE_RATE};
use crate::core::live::{GeminiLive, LiveError, LiveEvent, TurnSignal, UsageReport};
use crate::fetch::{self, FetchError};

/// Capture frames buffered between the audio thread and the send task.
/// At 512 samples per frame (32 ms at 16 kHz) this holds about a second.
const CAPTURE_CHANNEL_CAPACITY: usize = 32;

/// Errors that end or prevent a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// System instruction could not be resolved; nothing was started
    #[error("System instruction unavailable: {0}")]
    Instruction(#[from] FetchError),

    /// Microphone acquisition failed; terminal, full teardown
    #[error("Capture device error: {0}")]
    Device(#[from] CaptureError),

    /// Output device acquisition failed; terminal, full teardown
    #[error("Playback device error: {0}")]
    Playback(#[from] PlaybackError),

    /// Transport-level failure
    #[error("Transport error: {0}")]
    Transport(#[from] LiveError),
}

/// Components alive while the session runs.
struct Running {
    live: Arc<GeminiLive>,
    queue: PlaybackQueue,
    sink: Arc<CpalSink>,
    capture: CaptureSource,
    send_task: JoinHandle<()>,
    started_at: Instant,
}

/// One voice conversation: microphone in, synthesized audio out.
pub struct Session {
    config: AppConfig,
    running: Option<Running>,
    /// Cumulative token usage across the session.
    usage: Arc<parking_lot::Mutex<UsageReport>>,
    /// Signaled when the transport closes underneath a running session.
    closed: Arc<Notify>,
}

impl Session {
    /// Create a stopped session from resolved configuration.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            running: None,
            usage: Arc::new(parking_lot::Mutex::new(UsageReport::default())),
            closed: Arc::new(Notify::new()),
        }
    }

    /// Whether the session is currently running.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Token usage accumulated so far.
    pub fn usage(&self) -> UsageReport {
        *self.usage.lock()
    }

    /// Resolves when the transport closes underneath a running session.
    pub async fn wait_closed(&self) {
        self.closed.notified().await;
    }

    /// Start the session: resolve the instruction, connect the transport,
    /// open both audio devices, and begin streaming.
    ///
    /// Any failure leaves the session fully stopped. Starting an
    /// already-running session is a no-op.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.running.is_some() {
            tracing::debug!("Session already running");
            return Ok(());
        }

        let instruction = fetch::resolve_system_instruction(&self.config).await?;
        let live = Arc::new(GeminiLive::new(self.config.live_config(instruction))?);

        let sink = Arc::new(CpalSink::new(GEMINI_LIVE_OUTPUT_SAMPLE_RATE)?);
        let queue = PlaybackQueue::new(sink.clone());

        let playback = queue.clone();
        live.on_audio(Arc::new(move |frame| {
            let playback = playback.clone();
            Box::pin(async move {
                playback.enqueue(frame);
            })
        }));

        let usage = self.usage.clone();
        let flush_queue = queue.clone();
        let closed = self.closed.clone();
        live.on_event(Arc::new(move |event| {
            let usage = usage.clone();
            let flush_queue = flush_queue.clone();
            let closed = closed.clone();
            Box::pin(async move {
                match event {
                    LiveEvent::Transcript { direction, text } => {
                        tracing::info!(%direction, "{text}");
                    }
                    LiveEvent::Turn(TurnSignal::Interrupted) => {
                        // The user spoke over the model; whatever is queued
                        // is stale now.
                        flush_queue.clear();
                    }
                    LiveEvent::Turn(signal) => {
                        tracing::debug!(?signal, "Turn signal");
                    }
                    LiveEvent::Usage(report) => {
                        let mut totals = usage.lock();
                        totals.prompt_tokens += report.prompt_tokens;
                        totals.response_tokens += report.response_tokens;
                        totals.total_tokens += report.total_tokens;
                    }
                    LiveEvent::Unhandled(_) => {}
                    LiveEvent::TransportClosed => {
                        closed.notify_one();
                    }
                }
            })
        }));

        if let Err(e) = live.connect().await {
            sink.close();
            queue.close().await;
            return Err(e.into());
        }

        let (frame_tx, mut frame_rx) = mpsc::channel(CAPTURE_CHANNEL_CAPACITY);
        let send_live = live.clone();
        let send_task = tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                if let Err(e) = send_live.send_audio_frame(&frame).await {
                    tracing::error!("Failed to send capture frame: {e}");
                    break;
                }
            }
        });

        let capture_config = CaptureConfig {
            sample_rate: GEMINI_LIVE_INPUT_SAMPLE_RATE,
            frame_samples: DEFAULT_CAPTURE_FRAME_SAMPLES,
        };
        let capture = match CaptureSource::start(capture_config, frame_tx) {
            Ok(capture) => capture,
            Err(e) => {
                send_task.abort();
                live.close().await;
                sink.close();
                queue.close().await;
                return Err(e.into());
            }
        };

        self.running = Some(Running {
            live,
            queue,
            sink,
            capture,
            send_task,
            started_at: Instant::now(),
        });
        tracing::info!("Session started");
        Ok(())
    }

    /// Stop the session and release every resource. Idempotent: stopping
    /// a stopped (or never-started) session does nothing.
    pub async fn stop(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };

        // Teardown order: microphone first so no new frames arrive, then
        // the send path and the transport, then the playback device, then
        // the queue. The sink closes before the queue so an in-flight
        // render resolves instead of holding the worker open.
        running.capture.stop();
        running.send_task.abort();
        running.live.close().await;
        running.sink.close();
        running.queue.close().await;

        let totals = self.usage();
        tracing::info!(
            duration_secs = running.started_at.elapsed().as_secs(),
            prompt_tokens = totals.prompt_tokens,
            response_tokens = totals.response_tokens,
            total_tokens = totals.total_tokens,
            "Session stopped"
        );
    }
}
