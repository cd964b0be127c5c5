//! Microphone capture.
//!
//! Acquires the default input device at the capture rate and emits
//! fixed-length PCM16 frames into a bounded channel. The cpal callback
//! runs on the audio thread and never blocks: frames are handed off with
//! `try_send` and dropped with a warning if the consumer falls behind.
//!
//! Echo cancellation, noise suppression, and automatic gain control are
//! properties of the OS audio stack, not of this layer; the capture path
//! passes device samples through untouched.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;
use tokio::sync::mpsc;

use super::convert::float_frame_to_int16;
use super::frame::{AudioFrame, FrameChunker};

/// Errors raised while acquiring the microphone.
///
/// All of these are terminal for the session: capture cannot start, so the
/// whole pipeline tears down.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No usable input device
    #[error("Input device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Input stream could not be built or started
    #[error("Input stream error: {0}")]
    Stream(String),
}

/// Capture parameters.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Capture sample rate in Hz (16000 for the Gemini Live API).
    pub sample_rate: u32,
    /// Samples per emitted frame.
    pub frame_samples: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            frame_samples: 512,
        }
    }
}

/// Owns the microphone stream for the lifetime of a session.
///
/// The cpal stream is not `Send`, so it lives on a dedicated thread that
/// parks until [`CaptureSource::stop`] releases it.
pub struct CaptureSource {
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
}

impl CaptureSource {
    /// Acquire the default input device and start emitting frames into
    /// `frames`. Fails if no device is available or the stream cannot be
    /// built at the requested configuration.
    pub fn start(
        config: CaptureConfig,
        frames: mpsc::Sender<AudioFrame>,
    ) -> Result<Self, CaptureError> {
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || {
                match Self::build_stream(&config, frames) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        // Park until stop or drop releases the stream.
                        let _ = stop_rx.recv();
                        drop(stream);
                        tracing::info!("Capture stream stopped");
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| CaptureError::Stream("capture thread exited".to_string()))??;

        Ok(Self {
            stop_tx: Some(stop_tx),
        })
    }

    fn build_stream(
        config: &CaptureConfig,
        frames: mpsc::Sender<AudioFrame>,
    ) -> Result<cpal::Stream, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or_else(|| {
            CaptureError::DeviceUnavailable("no default input device".to_string())
        })?;
        let device_name = device.name().unwrap_or_else(|_| "<unknown>".to_string());

        let stream_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let sample_rate = config.sample_rate;
        let mut chunker = FrameChunker::new(config.frame_samples);
        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for frame in chunker.push(data) {
                        let frame = AudioFrame::new(float_frame_to_int16(&frame), sample_rate);
                        if frames.try_send(frame).is_err() {
                            // Never block the audio thread; losing a frame
                            // beats stalling the device callback.
                            tracing::warn!("Capture channel full, dropping frame");
                        }
                    }
                },
                |err| tracing::warn!("Capture stream error: {err}"),
                None,
            )
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        tracing::info!(
            device = %device_name,
            sample_rate = config.sample_rate,
            frame_samples = config.frame_samples,
            "Microphone capture started"
        );
        Ok(stream)
    }

    /// Release the device. Idempotent; safe to call on an already-stopped
    /// source.
    pub fn stop(&mut self) {
        self.stop_tx.take();
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        self.stop();
    }
}
