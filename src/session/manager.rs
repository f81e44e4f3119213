//! Process-wide registry of live Sessions, keyed by `call_id`.
//!
//! An `RwLock`-guarded map of handles, each backing a `tokio::spawn`-ed
//! background task — only start/stop/status, no subscription concern.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::audio::{RodioSynthesizer, SilentSpeechEngine, Synthesizer};
use crate::audio::{CpalTranscriber, NullTranscriptionBackend, Transcriber};
use crate::chat::Chat;
use crate::config::Config;
use crate::conversation::ConversationCore;
use crate::date_reasoner::DateReasoner;
use crate::session::Session;
use crate::workflow::{ChromiumBrowserSession, Mailer, ShiftWorkflow};

const STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a session for call_id {0:?} is already running")]
    AlreadyExists(String),
    #[error("no session found for call_id {0:?}")]
    NotFound(String),
}

struct SessionHandle {
    caller_phone: String,
    started_at: Instant,
    stop_signal: CancellationToken,
    join_handle: JoinHandle<()>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionSummary {
    pub call_id: String,
    pub uptime: u64,
    pub started_at: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionStatus {
    pub active_sessions: usize,
    pub sessions: Vec<SessionSummary>,
}

/// Process-wide registry of live Sessions. The registry mutex protects
/// only membership; all per-session work runs outside it.
pub struct SessionManager {
    config: Arc<Config>,
    large_chat: Arc<dyn Chat>,
    small_chat: Arc<dyn Chat>,
    mailer: Arc<dyn Mailer>,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(
        config: Arc<Config>,
        large_chat: Arc<dyn Chat>,
        small_chat: Arc<dyn Chat>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            config,
            large_chat,
            small_chat,
            mailer,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Construct and register a Session; its Transcriber starts
    /// synchronously with the registration, its event loop on a
    /// background task.
    pub async fn start(
        &self,
        call_id: String,
        caller_phone: String,
    ) -> Result<(), SessionError> {
        // Held across the whole check-and-insert so two concurrent starts
        // for the same call_id can't both pass the check.
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&call_id) {
            return Err(SessionError::AlreadyExists(call_id));
        }

        let browser = Arc::new(ChromiumBrowserSession::new(&self.config));
        let date_reasoner = DateReasoner::new(self.small_chat.clone(), self.config.today_override);
        let workflow = Arc::new(ShiftWorkflow::new(
            browser,
            self.mailer.clone(),
            date_reasoner,
            &self.config,
        ));
        let core = ConversationCore::new(self.large_chat.clone(), workflow, caller_phone.clone());

        let transcriber: Arc<dyn Transcriber> =
            Arc::new(CpalTranscriber::new(Arc::new(NullTranscriptionBackend)));
        let synthesizer: Arc<dyn Synthesizer> = Arc::new(RodioSynthesizer::new(
            Box::new(SilentSpeechEngine),
            self.config.audio_output_device.clone(),
        ));

        let session = Session::new(
            call_id.clone(),
            caller_phone.clone(),
            transcriber,
            synthesizer,
            core,
        );

        let stop_signal = CancellationToken::new();
        let join_handle = tokio::spawn(session.run(stop_signal.clone()));

        let handle = SessionHandle {
            caller_phone,
            started_at: Instant::now(),
            stop_signal,
            join_handle,
        };

        sessions.insert(call_id, handle);
        Ok(())
    }

    /// Signal cooperative stop, wait up to a bounded grace period, then
    /// abort the task if it hasn't shut down cleanly (e.g. stuck in a
    /// synthesizer call, which has no deadline of its own).
    pub async fn stop(&self, call_id: &str) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(call_id)
            .ok_or_else(|| SessionError::NotFound(call_id.to_string()))?;

        handle.stop_signal.cancel();

        let abort_handle = handle.join_handle.abort_handle();
        if tokio::time::timeout(STOP_GRACE_PERIOD, handle.join_handle)
            .await
            .is_err()
        {
            tracing::warn!(call_id = %call_id, "session did not stop within grace period, aborting");
            abort_handle.abort();
        }

        Ok(())
    }

    /// Snapshot view, safe to call concurrently with start/stop.
    pub async fn status(&self) -> SessionStatus {
        let sessions = self.sessions.read().await;
        let now = Instant::now();
        let summaries = sessions
            .iter()
            .map(|(call_id, handle)| SessionSummary {
                call_id: call_id.clone(),
                uptime: now.duration_since(handle.started_at).as_secs(),
                started_at: chrono::Utc::now().timestamp()
                    - now.duration_since(handle.started_at).as_secs() as i64,
            })
            .collect();

        SessionStatus {
            active_sessions: sessions.len(),
            sessions: summaries,
        }
    }

    /// Caller's phone number for a live session, used by webhook handlers
    /// that need to echo it back without reaching into Session internals.
    pub async fn caller_phone(&self, call_id: &str) -> Option<String> {
        self.sessions
            .read()
            .await
            .get(call_id)
            .map(|h| h.caller_phone.clone())
    }
}
