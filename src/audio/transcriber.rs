//! Transcriber: produces one utterance event per completed phrase,
//! delimited by a silence timeout or a hard duration cap.
//!
//! Capture wiring is grounded in the pack's `cpal`-based voice-input state
//! machine: a dedicated capture thread feeding samples into a buffer, a
//! channel bridging the capture side back to async code. The underlying
//! transcription model stays a pluggable `TranscriptionBackend` trait
//! object, since it is an out-of-scope external collaborator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const DEFAULT_SILENCE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_DURATION_CAP: Duration = Duration::from_secs(15);
const SILENCE_AMPLITUDE_THRESHOLD: f32 = 0.01;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum TranscriberError {
    #[error("no input audio device available")]
    NoInputDevice,
    #[error("failed to build audio input stream: {0}")]
    StreamBuildFailed(String),
}

/// Converts a segment of captured samples into text. A real speech-to-text
/// model is an out-of-scope external collaborator; this is the seam.
pub trait TranscriptionBackend: Send + Sync {
    fn transcribe(&self, samples: &[f32], sample_rate: u32) -> String;
}

/// Placeholder backend for environments with no transcription model
/// wired up: every segment transcribes to silence.
pub struct NullTranscriptionBackend;

impl TranscriptionBackend for NullTranscriptionBackend {
    fn transcribe(&self, _samples: &[f32], _sample_rate: u32) -> String {
        String::new()
    }
}

/// Produces utterance events; `pause`/`resume` are idempotent and only
/// suppress delivery, not capture.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Begin producing utterance events on the returned channel until
    /// `stop_signal` fires.
    async fn start(
        &self,
        stop_signal: CancellationToken,
    ) -> Result<mpsc::UnboundedReceiver<String>, TranscriberError>;

    fn pause(&self);
    fn resume(&self);
}

pub struct CpalTranscriber {
    backend: Arc<dyn TranscriptionBackend>,
    paused: Arc<AtomicBool>,
    silence_timeout: Duration,
    duration_cap: Duration,
}

impl CpalTranscriber {
    pub fn new(backend: Arc<dyn TranscriptionBackend>) -> Self {
        Self {
            backend,
            paused: Arc::new(AtomicBool::new(false)),
            silence_timeout: DEFAULT_SILENCE_TIMEOUT,
            duration_cap: DEFAULT_DURATION_CAP,
        }
    }
}

#[async_trait]
impl Transcriber for CpalTranscriber {
    async fn start(
        &self,
        stop_signal: CancellationToken,
    ) -> Result<mpsc::UnboundedReceiver<String>, TranscriberError> {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let buffer: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
        let buffer_for_stream = Arc::clone(&buffer);

        // `cpal::Stream` is neither `Send` nor `Sync`, so it cannot live
        // inside a tokio task. It's built, played, and kept alive on its
        // own dedicated thread instead; only captured samples cross over,
        // through `buffer`.
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<u32, TranscriberError>>();
        let capture_stop = stop_signal.clone();

        std::thread::spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_input_device() {
                Some(d) => d,
                None => {
                    let _ = ready_tx.send(Err(TranscriberError::NoInputDevice));
                    return;
                }
            };
            let config = match device.default_input_config() {
                Ok(c) => c,
                Err(e) => {
                    let _ = ready_tx.send(Err(TranscriberError::StreamBuildFailed(e.to_string())));
                    return;
                }
            };
            let sample_rate = config.sample_rate().0;

            let stream = match device.build_input_stream(
                &config.into(),
                move |data: &[f32], _| {
                    if let Ok(mut buf) = buffer_for_stream.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| tracing::warn!(error = %err, "cpal input stream error"),
                None,
            ) {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(TranscriberError::StreamBuildFailed(e.to_string())));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(TranscriberError::StreamBuildFailed(e.to_string())));
                return;
            }

            let _ = ready_tx.send(Ok(sample_rate));

            // The stream lives in this frame; it's dropped (stopping
            // capture) only once the caller cancels.
            while !capture_stop.is_cancelled() {
                std::thread::sleep(POLL_INTERVAL);
            }
        });

        let sample_rate = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .map_err(|e| TranscriberError::StreamBuildFailed(e.to_string()))?
            .map_err(|_| {
                TranscriberError::StreamBuildFailed(
                    "capture thread exited before starting".to_string(),
                )
            })??;

        let paused = Arc::clone(&self.paused);
        let backend = Arc::clone(&self.backend);
        let silence_timeout = self.silence_timeout;
        let duration_cap = self.duration_cap;

        tokio::spawn(async move {
            let mut segment_started_at: Option<Instant> = None;
            let mut last_voiced_at = Instant::now();

            loop {
                if stop_signal.is_cancelled() {
                    break;
                }
                tokio::time::sleep(POLL_INTERVAL).await;

                if paused.load(Ordering::SeqCst) {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.clear();
                    }
                    segment_started_at = None;
                    continue;
                }

                let has_voice = {
                    let buf = buffer.lock().unwrap_or_else(|e| e.into_inner());
                    buf.iter().any(|s| s.abs() > SILENCE_AMPLITUDE_THRESHOLD)
                };

                let now = Instant::now();
                if has_voice {
                    last_voiced_at = now;
                    if segment_started_at.is_none() {
                        segment_started_at = Some(now);
                    }
                }

                let Some(started) = segment_started_at else {
                    continue;
                };

                let silence_elapsed = now.duration_since(last_voiced_at);
                let segment_elapsed = now.duration_since(started);

                if silence_elapsed >= silence_timeout || segment_elapsed >= duration_cap {
                    let samples = {
                        let mut buf = buffer.lock().unwrap_or_else(|e| e.into_inner());
                        std::mem::take(&mut *buf)
                    };
                    segment_started_at = None;

                    if !samples.is_empty() {
                        let text = backend.transcribe(&samples, sample_rate);
                        if !text.trim().is_empty() && tx.send(text).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_backend_always_transcribes_to_empty_text() {
        let backend = NullTranscriptionBackend;
        assert_eq!(backend.transcribe(&[0.1, 0.2, 0.3], 16_000), "");
    }

    #[test]
    fn pause_flag_round_trips() {
        let transcriber = CpalTranscriber::new(Arc::new(NullTranscriptionBackend));
        assert!(!transcriber.paused.load(Ordering::SeqCst));
        transcriber.pause();
        assert!(transcriber.paused.load(Ordering::SeqCst));
        transcriber.resume();
        assert!(!transcriber.paused.load(Ordering::SeqCst));
    }
}
