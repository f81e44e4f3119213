//! Chat history types.
//!
//! Invariant: the first element of a history is always a
//! system message, and there is exactly one system message ever.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            text: text.into(),
        }
    }
}

/// Ordered message sequence owned exclusively by one Session (or Date
/// Reasoner instance); never shared across sessions.
#[derive(Debug, Clone)]
pub struct ChatHistory {
    system_prompt: String,
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            messages: vec![ChatMessage::system(system_prompt.clone())],
            system_prompt,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.ensure_system_invariant();
        self.messages.push(ChatMessage::user(text));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.ensure_system_invariant();
        self.messages.push(ChatMessage::assistant(text));
    }

    /// Re-insert the system message if it has been lost (e.g. external
    /// pruning). Must be called before any model call.
    pub fn ensure_system_invariant(&mut self) {
        match self.messages.first() {
            Some(msg) if msg.role == MessageRole::System => {}
            _ => {
                tracing::warn!("chat history lost its system message, re-inserting");
                self.messages
                    .insert(0, ChatMessage::system(self.system_prompt.clone()));
            }
        }
    }

    /// Clear everything but the system message (used by the Date
    /// Reasoner's retry path).
    pub fn reset_to_system(&mut self) {
        self.messages.truncate(0);
        self.messages.push(ChatMessage::system(self.system_prompt.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_history_starts_with_system_message() {
        let history = ChatHistory::new("be nice");
        assert_eq!(history.messages()[0].role, MessageRole::System);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn reinserts_system_message_if_lost() {
        let mut history = ChatHistory::new("be nice");
        history.push_user("hi");
        history.messages.remove(0); // simulate external pruning
        history.ensure_system_invariant();
        assert_eq!(history.messages()[0].role, MessageRole::System);
        assert_eq!(history.len(), 2);
    }
}
