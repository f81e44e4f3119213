//! Audio I/O contract: an asynchronous transcriber producing utterance
//! events, and a synthesizer that writes to a named output device.
//!
//! Both the transcription model and the text-to-speech engine are
//! out-of-scope external collaborators; this module defines the
//! trait contracts plus one concrete adapter per side so the crate runs
//! end-to-end.

mod synthesizer;
mod transcriber;

pub use synthesizer::{RodioSynthesizer, SilentSpeechEngine, SpeechEngine, Synthesizer, SynthesizerError};
pub use transcriber::{
    CpalTranscriber, NullTranscriptionBackend, Transcriber, TranscriberError, TranscriptionBackend,
};
