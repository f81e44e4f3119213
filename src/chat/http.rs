//! HTTP-backed `Chat` implementation against a generic, OpenAI-compatible
//! chat-completions endpoint.

use super::types::{ChatHistory, MessageRole};
use super::{Chat, ChatError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpChat {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpChat {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("failed to build chat http client");

        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
        }
    }

    fn translate(&self, history: &ChatHistory) -> CompletionRequest {
        let messages = history
            .messages()
            .iter()
            .map(|m| WireMessage {
                role: match m.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                }
                .to_string(),
                content: m.text.clone(),
            })
            .collect();

        CompletionRequest {
            model: self.model.clone(),
            messages,
        }
    }

    fn classify_error(status: reqwest::StatusCode, body: &str) -> ChatError {
        match status.as_u16() {
            400 => ChatError::invalid_request(format!("invalid request: {body}")),
            500..=599 => ChatError::server_error(format!("server error: {body}")),
            _ => ChatError::network(format!("HTTP {status}: {body}")),
        }
    }
}

#[async_trait]
impl Chat for HttpChat {
    async fn complete(&self, history: &ChatHistory) -> Result<String, ChatError> {
        let request = self.translate(history);

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ChatError::timeout(format!("request timed out: {e}"))
            } else {
                ChatError::network(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChatError::network(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_error(status, &body));
        }

        let parsed: CompletionResponse = serde_json::from_str(&body)
            .map_err(|e| ChatError::network(format!("failed to parse response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ChatError::empty_reply());
        }

        Ok(text)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatHistory as History;

    #[test]
    fn translate_preserves_message_order_and_roles() {
        let chat = HttpChat::new("http://localhost/v1/chat/completions", None, "test-model");
        let mut history = History::new("system prompt");
        history.push_user("hello");
        history.push_assistant("hi there");

        let request = chat.translate(&history);
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1].role, "user");
        assert_eq!(request.messages[2].role, "assistant");
    }
}
