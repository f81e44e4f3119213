//! Synthesizer: `speak(text)` blocks until playback completes, routed to
//! a configured named output device, falling back to the platform default
//! on an unknown name without failing the session.
//!
//! The text-to-speech engine itself is an out-of-scope external
//! collaborator; this adapter only owns device selection and playback.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum SynthesizerError {
    #[error("no audio output device available")]
    NoOutputDevice,
    #[error("failed to open audio output stream: {0}")]
    StreamOpenFailed(String),
}

/// One rendered utterance handed to the playback thread, with a channel
/// back to the caller for the completion signal.
struct PlaybackRequest {
    samples: Vec<f32>,
    sample_rate: u32,
    done: std::sync::mpsc::Sender<Result<(), SynthesizerError>>,
}

/// Converts text to audio samples. A real speech engine is an
/// out-of-scope external collaborator; this is the seam.
pub trait SpeechEngine: Send + Sync {
    /// Render `text` to raw samples, returned as a mono `f32` PCM buffer
    /// plus its sample rate.
    fn render(&self, text: &str) -> (Vec<f32>, u32);
}

/// Silent placeholder engine, for environments with no TTS model wired up.
pub struct SilentSpeechEngine;

impl SpeechEngine for SilentSpeechEngine {
    fn render(&self, _text: &str) -> (Vec<f32>, u32) {
        (Vec::new(), 16_000)
    }
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), SynthesizerError>;
}

pub struct RodioSynthesizer {
    engine: Box<dyn SpeechEngine>,
    device_name: Option<String>,
    // `OutputStream`/`OutputStreamHandle` are neither `Send` nor `Sync`, so
    // they're owned entirely by a dedicated playback thread; this struct
    // only ever holds the (Send) channel used to hand that thread work.
    command_tx: Mutex<Option<std::sync::mpsc::Sender<PlaybackRequest>>>,
}

impl RodioSynthesizer {
    pub fn new(engine: Box<dyn SpeechEngine>, device_name: Option<String>) -> Self {
        Self {
            engine,
            device_name,
            command_tx: Mutex::new(None),
        }
    }

    fn open_stream(
        device_name: Option<&str>,
    ) -> Result<(OutputStream, OutputStreamHandle), SynthesizerError> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => host
                .output_devices()
                .map_err(|e| SynthesizerError::StreamOpenFailed(e.to_string()))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .or_else(|| {
                    tracing::warn!(device = %name, "unknown audio output device, falling back to default");
                    host.default_output_device()
                }),
            None => host.default_output_device(),
        }
        .ok_or(SynthesizerError::NoOutputDevice)?;

        OutputStream::try_from_device(&device)
            .map_err(|e| SynthesizerError::StreamOpenFailed(e.to_string()))
    }

    /// Opens the output stream on a dedicated thread and returns a handle
    /// for submitting playback requests to it. The thread, and the stream
    /// it owns, live until the returned sender is dropped.
    fn spawn_playback_thread(
        device_name: Option<String>,
    ) -> Result<std::sync::mpsc::Sender<PlaybackRequest>, SynthesizerError> {
        let (tx, rx) = std::sync::mpsc::channel::<PlaybackRequest>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), SynthesizerError>>();

        std::thread::spawn(move || {
            let (_stream, handle) = match Self::open_stream(device_name.as_deref()) {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            for request in rx {
                let result = Sink::try_new(&handle)
                    .map_err(|e| SynthesizerError::StreamOpenFailed(e.to_string()))
                    .map(|sink| {
                        let source =
                            rodio::buffer::SamplesBuffer::new(1, request.sample_rate, request.samples);
                        sink.append(source);
                        sink.sleep_until_end();
                    });
                let _ = request.done.send(result);
            }
        });

        ready_rx
            .recv()
            .map_err(|_| {
                SynthesizerError::StreamOpenFailed(
                    "playback thread exited before starting".to_string(),
                )
            })??;

        Ok(tx)
    }
}

#[async_trait]
impl Synthesizer for RodioSynthesizer {
    async fn speak(&self, text: &str) -> Result<(), SynthesizerError> {
        let (samples, sample_rate) = self.engine.render(text);
        if samples.is_empty() {
            return Ok(());
        }

        let tx = {
            let mut guard = self.command_tx.lock().await;
            if guard.is_none() {
                *guard = Some(Self::spawn_playback_thread(self.device_name.clone())?);
            }
            guard.as_ref().expect("just populated").clone()
        };

        let (done_tx, done_rx) = std::sync::mpsc::channel::<Result<(), SynthesizerError>>();
        tx.send(PlaybackRequest {
            samples,
            sample_rate,
            done: done_tx,
        })
        .map_err(|_| SynthesizerError::StreamOpenFailed("playback thread has stopped".to_string()))?;

        tokio::task::spawn_blocking(move || done_rx.recv())
            .await
            .map_err(|e| SynthesizerError::StreamOpenFailed(e.to_string()))?
            .map_err(|_| {
                SynthesizerError::StreamOpenFailed("playback thread has stopped".to_string())
            })??;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_engine_renders_empty_samples() {
        let engine = SilentSpeechEngine;
        let (samples, rate) = engine.render("hello");
        assert!(samples.is_empty());
        assert_eq!(rate, 16_000);
    }
}
