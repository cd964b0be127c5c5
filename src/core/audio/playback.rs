//! Ordered playback of decoded audio frames.
//!
//! Inbound frames are queued and rendered strictly in arrival order by a
//! single worker task; at most one frame is rendering at any instant. The
//! queue hands normalized `f32` samples to a [`PlaybackSink`], whose
//! `render` future resolves when the frame has been consumed, so
//! chunk-to-chunk scheduling is gapless.
//!
//! # Thread Safety
//!
//! The queue is a cheap `Arc` handle; clones share the same entries and
//! worker. The cpal sink keeps the device stream on a dedicated thread
//! (cpal streams are not `Send`) and exchanges samples through a shared
//! ring buffer that the audio callback drains without blocking.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::convert::int16_frame_to_float;
use super::frame::AudioFrame;

/// Errors that can occur while rendering audio.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No usable output device
    #[error("Output device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Output stream could not be built or started
    #[error("Output stream error: {0}")]
    Stream(String),

    /// The sink was closed while rendering
    #[error("Playback sink closed")]
    Closed,
}

/// Destination for normalized samples, rendered one frame at a time.
///
/// `render` must resolve only once the samples have been consumed; the
/// queue relies on that to keep frames sequential and gapless.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Render one frame of normalized samples to completion.
    async fn render(&self, samples: Vec<f32>) -> Result<(), PlaybackError>;
}

/// Playback progress state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No playback in progress; the only rest state is Idle with an
    /// empty queue.
    Idle,
    /// Exactly one entry is being rendered.
    Playing,
}

struct QueueInner {
    entries: parking_lot::Mutex<VecDeque<AudioFrame>>,
    state: parking_lot::Mutex<PlaybackState>,
    wakeup: Notify,
    /// Signaled once by close; interrupts a render that never resolves.
    stop: Notify,
    shutdown: AtomicBool,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

/// Strict-FIFO queue of decoded frames with a single sequential consumer.
#[derive(Clone)]
pub struct PlaybackQueue {
    inner: Arc<QueueInner>,
}

impl PlaybackQueue {
    /// Create a queue draining into `sink` and start its worker task.
    pub fn new(sink: Arc<dyn PlaybackSink>) -> Self {
        let inner = Arc::new(QueueInner {
            entries: parking_lot::Mutex::new(VecDeque::new()),
            state: parking_lot::Mutex::new(PlaybackState::Idle),
            wakeup: Notify::new(),
            stop: Notify::new(),
            shutdown: AtomicBool::new(false),
            worker: parking_lot::Mutex::new(None),
        });

        let worker_inner = inner.clone();
        let handle = tokio::spawn(async move {
            Self::run_worker(worker_inner, sink).await;
        });
        *inner.worker.lock() = Some(handle);

        Self { inner }
    }

    /// Append a frame to the tail. If the queue is idle the worker picks
    /// it up immediately.
    pub fn enqueue(&self, frame: AudioFrame) {
        if self.inner.shutdown.load(Ordering::SeqCst) {
            tracing::debug!("Playback queue closed, dropping frame");
            return;
        }
        self.inner.entries.lock().push_back(frame);
        self.inner.wakeup.notify_one();
    }

    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        *self.inner.state.lock()
    }

    /// Number of frames waiting to be rendered (excludes the one playing).
    pub fn pending(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Drop all pending frames. The frame currently rendering, if any,
    /// finishes; nothing queued behind it survives.
    pub fn clear(&self) {
        let dropped = {
            let mut entries = self.inner.entries.lock();
            let n = entries.len();
            entries.clear();
            n
        };
        if dropped > 0 {
            tracing::debug!(dropped, "Cleared pending playback frames");
        }
    }

    /// Stop the worker and drop pending frames. Idempotent; returns even
    /// if the sink has a render in flight that will never resolve.
    pub async fn close(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.stop.notify_one();
        self.inner.wakeup.notify_one();
        let handle = self.inner.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.clear();
    }

    async fn run_worker(inner: Arc<QueueInner>, sink: Arc<dyn PlaybackSink>) {
        loop {
            if inner.shutdown.load(Ordering::SeqCst) {
                break;
            }
            let next = inner.entries.lock().pop_front();
            match next {
                Some(frame) => {
                    *inner.state.lock() = PlaybackState::Playing;
                    let samples = int16_frame_to_float(frame.samples());
                    tokio::select! {
                        result = sink.render(samples) => match result {
                            Ok(()) => {}
                            Err(PlaybackError::Closed) => {
                                tracing::debug!("Playback sink closed, stopping worker");
                                break;
                            }
                            Err(e) => {
                                tracing::warn!("Failed to render playback frame: {e}");
                            }
                        },
                        // A sink stuck mid-render must not wedge shutdown.
                        _ = inner.stop.notified() => break,
                    }
                }
                None => {
                    *inner.state.lock() = PlaybackState::Idle;
                    inner.wakeup.notified().await;
                }
            }
        }
        *inner.state.lock() = PlaybackState::Idle;
    }
}

// =============================================================================
// Cpal output sink
// =============================================================================

struct SinkShared {
    /// Samples queued for the device callback, oldest first.
    ring: parking_lot::Mutex<VecDeque<f32>>,
    /// Signaled by the callback whenever the ring is empty.
    drained: Notify,
    stopped: AtomicBool,
}

/// Playback sink backed by the default cpal output device.
pub struct CpalSink {
    shared: Arc<SinkShared>,
    stop_tx: parking_lot::Mutex<Option<std::sync::mpsc::Sender<()>>>,
}

impl CpalSink {
    /// Open the default output device at `sample_rate` (mono) and start
    /// the stream. The stream lives on its own thread until the sink is
    /// closed or dropped.
    pub fn new(sample_rate: u32) -> Result<Self, PlaybackError> {
        let shared = Arc::new(SinkShared {
            ring: parking_lot::Mutex::new(VecDeque::new()),
            drained: Notify::new(),
            stopped: AtomicBool::new(false),
        });

        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let thread_shared = shared.clone();
        std::thread::Builder::new()
            .name("playback-sink".into())
            .spawn(move || {
                match Self::build_stream(&thread_shared, sample_rate) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        // Park until close or drop; recv fails once the
                        // sender side is gone.
                        let _ = stop_rx.recv();
                        drop(stream);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| PlaybackError::Stream(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| PlaybackError::Stream("playback thread exited".to_string()))??;

        Ok(Self {
            shared,
            stop_tx: parking_lot::Mutex::new(Some(stop_tx)),
        })
    }

    fn build_stream(
        shared: &Arc<SinkShared>,
        sample_rate: u32,
    ) -> Result<cpal::Stream, PlaybackError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| {
            PlaybackError::DeviceUnavailable("no default output device".to_string())
        })?;

        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let cb_shared = shared.clone();
        let stream = device
            .build_output_stream(
                &config,
                move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut ring = cb_shared.ring.lock();
                    for slot in out.iter_mut() {
                        *slot = ring.pop_front().unwrap_or(0.0);
                    }
                    let empty = ring.is_empty();
                    drop(ring);
                    if empty {
                        cb_shared.drained.notify_one();
                    }
                },
                |err| tracing::warn!("Playback stream error: {err}"),
                None,
            )
            .map_err(|e| PlaybackError::Stream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| PlaybackError::Stream(e.to_string()))?;

        tracing::info!(sample_rate, "Playback stream started");
        Ok(stream)
    }

    /// Stop the device stream and wake any pending render. Idempotent.
    pub fn close(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        self.shared.drained.notify_one();
        self.stop_tx.lock().take();
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl PlaybackSink for CpalSink {
    async fn render(&self, samples: Vec<f32>) -> Result<(), PlaybackError> {
        if self.shared.stopped.load(Ordering::SeqCst) {
            return Err(PlaybackError::Closed);
        }
        self.shared.ring.lock().extend(samples);
        loop {
            if self.shared.stopped.load(Ordering::SeqCst) {
                return Err(PlaybackError::Closed);
            }
            if self.shared.ring.lock().is_empty() {
                return Ok(());
            }
            self.shared.drained.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Sink that records render order and tracks concurrency.
    struct MockSink {
        rendered: parking_lot::Mutex<Vec<Vec<f32>>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
    }

    impl MockSink {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                rendered: parking_lot::Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                delay,
            })
        }
    }

    #[async_trait]
    impl PlaybackSink for MockSink {
        async fn render(&self, samples: Vec<f32>) -> Result<(), PlaybackError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.rendered.lock().push(samples);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn wait_idle(queue: &PlaybackQueue) {
        for _ in 0..200 {
            if queue.pending() == 0 && queue.state() == PlaybackState::Idle {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("queue did not drain to idle");
    }

    #[tokio::test]
    async fn test_renders_in_fifo_order() {
        let sink = MockSink::new(Duration::from_millis(10));
        let queue = PlaybackQueue::new(sink.clone());

        queue.enqueue(AudioFrame::new(vec![1], 24000));
        queue.enqueue(AudioFrame::new(vec![2], 24000));
        queue.enqueue(AudioFrame::new(vec![3], 24000));

        wait_idle(&queue).await;

        let rendered = sink.rendered.lock().clone();
        assert_eq!(rendered.len(), 3);
        // i16 -> f32 normalization happens before the sink sees samples.
        assert_eq!(rendered[0], vec![1.0 / 32768.0]);
        assert_eq!(rendered[1], vec![2.0 / 32768.0]);
        assert_eq!(rendered[2], vec![3.0 / 32768.0]);
        assert_eq!(sink.max_in_flight.load(Ordering::SeqCst), 1);

        queue.close().await;
    }

    #[tokio::test]
    async fn test_idle_until_enqueue_then_idle_again() {
        let sink = MockSink::new(Duration::from_millis(1));
        let queue = PlaybackQueue::new(sink.clone());

        assert_eq!(queue.state(), PlaybackState::Idle);
        queue.enqueue(AudioFrame::new(vec![0; 8], 24000));
        wait_idle(&queue).await;
        assert_eq!(sink.rendered.lock().len(), 1);

        queue.close().await;
    }

    #[tokio::test]
    async fn test_normalizes_known_sample() {
        let sink = MockSink::new(Duration::ZERO);
        let queue = PlaybackQueue::new(sink.clone());

        queue.enqueue(AudioFrame::new(vec![16384, -16384], 24000));
        wait_idle(&queue).await;

        assert_eq!(sink.rendered.lock()[0], vec![0.5, -0.5]);
        queue.close().await;
    }

    #[tokio::test]
    async fn test_clear_drops_pending_frames() {
        let sink = MockSink::new(Duration::from_millis(50));
        let queue = PlaybackQueue::new(sink.clone());

        for i in 0..5i16 {
            queue.enqueue(AudioFrame::new(vec![i], 24000));
        }
        // Let the worker pick up the head, then flush the rest.
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.clear();
        wait_idle(&queue).await;

        assert!(sink.rendered.lock().len() < 5);
        queue.close().await;
    }

    /// Sink whose render never resolves, like a stalled output stream.
    struct StalledSink;

    #[async_trait]
    impl PlaybackSink for StalledSink {
        async fn render(&self, _samples: Vec<f32>) -> Result<(), PlaybackError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_close_returns_while_render_is_stuck() {
        let queue = PlaybackQueue::new(Arc::new(StalledSink));
        queue.enqueue(AudioFrame::new(vec![1], 24000));

        // Let the worker enter the render that will never finish.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(queue.state(), PlaybackState::Playing);

        tokio::time::timeout(Duration::from_secs(1), queue.close())
            .await
            .expect("close did not return with a stuck render in flight");
        assert_eq!(queue.state(), PlaybackState::Idle);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_drops_enqueues() {
        let sink = MockSink::new(Duration::ZERO);
        let queue = PlaybackQueue::new(sink.clone());

        queue.close().await;
        queue.close().await;

        queue.enqueue(AudioFrame::new(vec![7], 24000));
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.state(), PlaybackState::Idle);
    }
}
