//! Chat abstraction over the underlying language model service.
//!
//! The model itself is an out-of-scope external collaborator; this module
//! defines the contract a Conversation Core or Date Reasoner uses to talk
//! to it, plus one concrete HTTP-backed implementation.

mod error;
mod http;
mod types;

pub use error::{ChatError, ChatErrorKind};
pub use http::HttpChat;
pub use types::{ChatHistory, ChatMessage, MessageRole};

use async_trait::async_trait;

/// Common interface for language-model backed dialogue. The Chat is given
/// a full history (system message first) on every call; implementations
/// are stateless aside from the transport.
#[async_trait]
pub trait Chat: Send + Sync {
    /// Submit the full history and return the assistant's raw reply text.
    async fn complete(&self, history: &ChatHistory) -> Result<String, ChatError>;

    /// Model identifier, for logging.
    fn model_id(&self) -> &str;
}

/// Logging wrapper, mirroring the decorator used for the underlying
/// model-service calls elsewhere in the stack: never logs message bodies,
/// only durations and outcome.
pub struct LoggingChat {
    inner: std::sync::Arc<dyn Chat>,
    model_id: String,
}

impl LoggingChat {
    pub fn new(inner: std::sync::Arc<dyn Chat>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl Chat for LoggingChat {
    async fn complete(&self, history: &ChatHistory) -> Result<String, ChatError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(history).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    messages = history.len(),
                    "chat request completed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    retryable = e.kind.is_retryable(),
                    "chat request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
