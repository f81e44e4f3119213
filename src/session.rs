//! Session: owns one call's Transcriber, Chat-driven Conversation Core,
//! and Synthesizer; routes utterance events between them.

mod manager;

pub use manager::{SessionError, SessionManager, SessionStatus, SessionSummary};

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::audio::{Synthesizer, Transcriber};
use crate::conversation::ConversationCore;

const HANDLER_PANIC_APOLOGY: &str = "Sorry, I had a problem — let's start over.";

/// One call's live processing context.
pub struct Session {
    pub call_id: String,
    pub caller_phone: String,
    pub started_at: Instant,
    transcriber: Arc<dyn Transcriber>,
    synthesizer: Arc<dyn Synthesizer>,
    core: ConversationCore,
}

impl Session {
    pub fn new(
        call_id: String,
        caller_phone: String,
        transcriber: Arc<dyn Transcriber>,
        synthesizer: Arc<dyn Synthesizer>,
        core: ConversationCore,
    ) -> Self {
        Self {
            call_id,
            caller_phone,
            started_at: Instant::now(),
            transcriber,
            synthesizer,
            core,
        }
    }

    /// Blocks until `stop_signal` fires or the Transcriber terminates.
    pub async fn run(mut self, stop_signal: CancellationToken) {
        let mut utterances = match self.transcriber.start(stop_signal.clone()).await {
            Ok(rx) => rx,
            Err(e) => {
                tracing::error!(call_id = %self.call_id, error = %e, "transcriber failed to start");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = stop_signal.cancelled() => {
                    tracing::info!(call_id = %self.call_id, "session stopping on signal");
                    break;
                }
                maybe_text = utterances.recv() => {
                    let Some(text) = maybe_text else {
                        // A closed channel means the transcriber terminated; fatal to the session.
                        tracing::warn!(call_id = %self.call_id, "transcriber channel closed");
                        break;
                    };
                    self.handle_utterance(text).await;
                }
            }
        }
    }

    async fn handle_utterance(&mut self, text: String) {
        self.transcriber.pause();

        let outcome = AssertUnwindSafe(self.core.on_utterance(&text))
            .catch_unwind()
            .await;

        match outcome {
            Ok(reply) => {
                if let Some(reply) = reply {
                    self.speak(&reply).await;
                }
            }
            Err(_) => {
                tracing::error!(call_id = %self.call_id, "handler panicked, resetting context");
                self.core.reset_context();
                self.speak(HANDLER_PANIC_APOLOGY).await;
            }
        }

        self.transcriber.resume();
    }

    async fn speak(&self, text: &str) {
        // A Synthesizer error is non-fatal: drop the reply, keep processing.
        if let Err(e) = self.synthesizer.speak(text).await {
            tracing::warn!(call_id = %self.call_id, error = %e, "synthesizer error, dropping reply");
        }
    }
}
