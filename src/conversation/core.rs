//! The Conversation Core's utterance-driven loop.
//!
//! `process` handles a chain of handler-triggered follow-ups (e.g. a
//! shift lookup that immediately asks the model to summarize the
//! result) as an explicit `while` loop over a depth counter rather than
//! literal recursion, avoiding unbounded async recursion while keeping
//! the same depth-bounded behavior.

use std::sync::Arc;

use crate::chat::{Chat, ChatHistory};
use crate::workflow::ShiftWorkflow;

use super::action::{self, Action};
use super::context::ConversationContext;

/// Kept as data, not interleaved with handler code: the tag vocabulary
/// and output-format rules live entirely in this string.
pub const SYSTEM_PROMPT: &str = r#"You are a phone assistant helping staff view and cancel their shifts.

When you need to look up a caller's shifts, emit exactly:
<GETSHIFTS> <free text describing the time period requested>

When the caller has picked one shift to cancel, emit exactly:
<CONFIRM_CANCEL> <shift_id>

When the caller has given a reason for cancelling, emit exactly:
<REASON> <the reason, verbatim>

If the caller asks for a human, emit <LOGIN> or <REAL>.
If the request is out of scope or abusive, emit <DENY>.

Never narrate both sides of the conversation. Never write a line starting
with "User:" or "You:". Speak only as the assistant.
"#;

const MAX_DEPTH: u8 = 4;

const LOGIN_TRANSFER_MESSAGE: &str =
    "I'll transfer you to a live team member now, please hold.";
const REAL_TRANSFER_MESSAGE: &str =
    "Let me get a real person on the line for you, one moment please.";
const DENY_MESSAGE: &str =
    "I'm sorry, I'm not able to help with that. Is there anything else about your shifts I can do?";
const HANDLER_FAILURE_MESSAGE: &str =
    "Sorry, I had a problem with that request. Could you try again?";

enum HandlerOutcome {
    Recurse(String),
    Final(String),
}

/// One Session's dialogue engine. Owns the Chat history exclusively;
/// never shared across sessions.
pub struct ConversationCore {
    chat: Arc<dyn Chat>,
    workflow: Arc<ShiftWorkflow>,
    history: ChatHistory,
    context: ConversationContext,
    caller_phone: String,
}

impl ConversationCore {
    pub fn new(chat: Arc<dyn Chat>, workflow: Arc<ShiftWorkflow>, caller_phone: String) -> Self {
        Self {
            chat,
            workflow,
            history: ChatHistory::new(SYSTEM_PROMPT),
            context: ConversationContext::new(),
            caller_phone,
        }
    }

    /// Clear the Conversation Context (session start, successful
    /// cancellation, or explicit reset after a handler failure).
    pub fn reset_context(&mut self) {
        self.context.reset();
    }

    /// Entry point: one complete utterance in, at most one spoken reply
    /// out. Transcriber pause/resume coordination is the caller's
    /// responsibility.
    pub async fn on_utterance(&mut self, text: &str) -> Option<String> {
        let reply = self.process(text.to_string(), 0).await;
        if reply.trim().is_empty() {
            None
        } else {
            Some(reply)
        }
    }

    async fn process(&mut self, input: String, depth: u8) -> String {
        let mut current = input;
        let mut depth = depth;

        loop {
            if depth > MAX_DEPTH {
                return sanitize(&current);
            }

            self.history.ensure_system_invariant();
            self.history.push_user(current.clone());

            let raw = match self.chat.complete(&self.history).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "conversation core chat call failed");
                    return HANDLER_FAILURE_MESSAGE.to_string();
                }
            };
            self.history.push_assistant(raw.clone());

            match action::parse(&raw) {
                Some(action) => match self.dispatch(action).await {
                    HandlerOutcome::Recurse(observation) => {
                        current = observation;
                        depth += 1;
                        continue;
                    }
                    HandlerOutcome::Final(text) => return text,
                },
                None => return sanitize(&raw),
            }
        }
    }

    async fn dispatch(&mut self, action: Action) -> HandlerOutcome {
        match action {
            Action::GetShifts(payload) => self.handle_get_shifts(&payload).await,
            Action::ConfirmCancel(shift_id) => self.handle_confirm_cancel(&shift_id),
            Action::Reason(reason) => self.handle_reason(&reason).await,
            Action::Login => HandlerOutcome::Final(LOGIN_TRANSFER_MESSAGE.to_string()),
            Action::Real => HandlerOutcome::Final(REAL_TRANSFER_MESSAGE.to_string()),
            Action::Deny => HandlerOutcome::Final(DENY_MESSAGE.to_string()),
        }
    }

    async fn handle_get_shifts(&mut self, payload: &str) -> HandlerOutcome {
        match self.workflow.lookup(&self.caller_phone, payload).await {
            Ok(result) => {
                let intent_word = match result.intent {
                    crate::workflow::Intent::Cancel => "cancel",
                    crate::workflow::Intent::View => "view",
                    crate::workflow::Intent::Unknown => "unclear",
                };
                self.context.is_cancellation = matches!(result.intent, crate::workflow::Intent::Cancel);
                self.context.staff_info = Some(result.staff);
                self.context.current_shifts = result.filtered_shifts.clone();

                let observation = format!(
                    "Found {} shift(s) for the requested period. Caller's intent appears to be: {}. \
                     Read the shifts back and ask which one, if more than one.",
                    result.filtered_shifts.len(),
                    intent_word
                );
                HandlerOutcome::Recurse(observation)
            }
            Err(e) => {
                tracing::warn!(error = %e, "shift lookup failed");
                HandlerOutcome::Recurse(
                    "The shift lookup failed. Apologize and ask the caller to try again.".to_string(),
                )
            }
        }
    }

    fn handle_confirm_cancel(&mut self, shift_id: &str) -> HandlerOutcome {
        match self.context.find_shift(shift_id).cloned() {
            Some(shift) => {
                self.context.selected_shift = Some(shift);
                HandlerOutcome::Recurse(
                    "The caller confirmed a shift. Ask for the reason for cancellation.".to_string(),
                )
            }
            None => HandlerOutcome::Recurse(
                "The shift id was not recognized. Re-ask the caller which shift they mean."
                    .to_string(),
            ),
        }
    }

    async fn handle_reason(&mut self, reason: &str) -> HandlerOutcome {
        let (staff, shift) = match (&self.context.staff_info, &self.context.selected_shift) {
            (Some(staff), Some(shift)) => (staff.clone(), shift.clone()),
            _ => {
                return HandlerOutcome::Recurse(
                    "No shift has been confirmed yet. Ask the caller to pick a shift first."
                        .to_string(),
                )
            }
        };

        match self
            .workflow
            .submit_cancellation(&staff, &shift, Some(reason))
            .await
        {
            Ok(()) => {
                self.context.selected_shift = None;
                self.context.current_shifts.clear();
                HandlerOutcome::Recurse(
                    "The cancellation was submitted successfully. Thank the caller and ask if \
                     there's anything else."
                        .to_string(),
                )
            }
            Err(e) => {
                tracing::warn!(error = %e, "cancellation submission failed");
                HandlerOutcome::Recurse(
                    "The submission failed. Apologize and suggest the caller try again shortly."
                        .to_string(),
                )
            }
        }
    }
}

/// Cut speculative multi-turn text at the first `User:` occurrence, strip
/// a leading `You:` prefix, and trim.
fn sanitize(raw: &str) -> String {
    let cut = match raw.find("User:") {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    let stripped = cut.strip_prefix("You:").unwrap_or(cut);
    stripped.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_cuts_at_first_user_line() {
        let raw = "Sure, I can help.\nUser: and then they said...";
        assert_eq!(sanitize(raw), "Sure, I can help.");
    }

    #[test]
    fn sanitize_strips_leading_you_prefix() {
        assert_eq!(sanitize("You: hello there"), "hello there");
    }

    #[test]
    fn sanitize_leaves_plain_text_untouched() {
        assert_eq!(sanitize("just a normal reply"), "just a normal reply");
    }
}
