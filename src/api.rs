//! Webhook HTTP surface: a thin adapter onto the Session Manager.

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)]
pub use types::*;

use crate::config::Config;
use crate::session::SessionManager;
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(sessions: Arc<SessionManager>, config: Arc<Config>) -> Self {
        Self { sessions, config }
    }
}
