//! Natural-language time-phrase -> closed date interval, with retry and
//! a safe documented default.
//!
//! A small, timeout-bounded, single-purpose call to a cheap model, with a
//! documented fallback on failure. The reasoner owns its own `ChatHistory`,
//! never shared with the Conversation Core's.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Days, NaiveDate};
use serde::Deserialize;
use tokio::time::timeout;

use crate::chat::{Chat, ChatHistory};
use crate::workflow::Intent;

const REASONING_TIMEOUT: Duration = Duration::from_secs(10);

const SYSTEM_PROMPT_TEMPLATE: &str = r#"You convert a caller's natural-language time phrase into a concrete date range.
Today is {today} ({weekday}). The coming Sunday is {coming_sunday}.
Reply with exactly one JSON object and nothing else, in this shape:
{{"start": "YYYY-MM-DD", "end": "YYYY-MM-DD", "intent": "cancel" | "view" | "unknown", "is_shift_query": true | false, "rationale": "short reason"}}"#;

#[derive(Debug, Clone, PartialEq)]
pub struct DateReasoning {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub intent: Intent,
    pub is_shift_query: bool,
    pub rationale: String,
}

#[derive(Debug, Deserialize)]
struct RawReasoning {
    start: String,
    end: String,
    intent: String,
    is_shift_query: bool,
    rationale: String,
}

/// Small inference component with its own private `ChatHistory` and a
/// two-attempt retry protocol before falling back to a safe default.
pub struct DateReasoner {
    chat: Arc<dyn Chat>,
    history: tokio::sync::Mutex<ChatHistory>,
    today_override: Option<NaiveDate>,
}

impl DateReasoner {
    pub fn new(chat: Arc<dyn Chat>, today_override: Option<NaiveDate>) -> Self {
        let today = today_override.unwrap_or_else(today_from_clock);
        let system_prompt = render_system_prompt(today);
        Self {
            chat,
            history: tokio::sync::Mutex::new(ChatHistory::new(system_prompt)),
            today_override,
        }
    }

    fn today(&self) -> NaiveDate {
        self.today_override.unwrap_or_else(today_from_clock)
    }

    /// Resolve `utterance` into a `DateReasoning`, retrying once on
    /// parse/validation failure and falling back to the documented
    /// default if both attempts fail.
    pub async fn reason(&self, utterance: &str) -> DateReasoning {
        let mut history = self.history.lock().await;
        history.ensure_system_invariant();
        history.push_user(utterance.to_string());

        if let Some(reasoning) = self.attempt(&history).await {
            return reasoning;
        }

        tracing::warn!("date reasoning attempt 1 failed validation, retrying");
        history.reset_to_system();
        history.push_user(utterance.to_string());

        if let Some(reasoning) = self.attempt(&history).await {
            return reasoning;
        }

        tracing::warn!("date reasoning attempt 2 failed, returning default interval");
        default_reasoning(self.today())
    }

    async fn attempt(&self, history: &ChatHistory) -> Option<DateReasoning> {
        let raw = match timeout(REASONING_TIMEOUT, self.chat.complete(history)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "date reasoner chat call failed");
                return None;
            }
            Err(_) => {
                tracing::warn!("date reasoner chat call timed out");
                return None;
            }
        };

        parse_and_validate(&raw)
    }
}

fn today_from_clock() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn render_system_prompt(today: NaiveDate) -> String {
    let days_until_sunday = (7 - today.weekday().num_days_from_monday() as i64 + 6) % 7;
    let days_until_sunday = if days_until_sunday == 0 { 7 } else { days_until_sunday };
    let coming_sunday = today + Days::new(days_until_sunday as u64);

    SYSTEM_PROMPT_TEMPLATE
        .replace("{today}", &today.format("%Y-%m-%d").to_string())
        .replace("{weekday}", &today.weekday().to_string())
        .replace("{coming_sunday}", &coming_sunday.format("%Y-%m-%d").to_string())
}

/// Extract the first balanced `{...}` substring, since the reply is not
/// guaranteed to be bare JSON, then validate required fields.
fn parse_and_validate(raw: &str) -> Option<DateReasoning> {
    let json_slice = extract_first_json_object(raw)?;
    let parsed: RawReasoning = serde_json::from_str(json_slice).ok()?;

    let start = NaiveDate::parse_from_str(&parsed.start, "%Y-%m-%d").ok()?;
    let end = NaiveDate::parse_from_str(&parsed.end, "%Y-%m-%d").ok()?;
    if start > end {
        return None;
    }

    let intent = match parsed.intent.as_str() {
        "cancel" => Intent::Cancel,
        "view" => Intent::View,
        _ => Intent::Unknown,
    };

    Some(DateReasoning {
        start,
        end,
        intent,
        is_shift_query: parsed.is_shift_query,
        rationale: parsed.rationale,
    })
}

fn extract_first_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0i32;
    for (offset, ch) in raw[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn default_reasoning(today: NaiveDate) -> DateReasoning {
    DateReasoning {
        start: today,
        end: today + Days::new(7),
        intent: Intent::Unknown,
        is_shift_query: false,
        rationale: "default".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedChat {
        replies: Vec<&'static str>,
        call_count: AtomicUsize,
    }

    #[async_trait]
    impl Chat for ScriptedChat {
        async fn complete(&self, _history: &ChatHistory) -> Result<String, ChatError> {
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(self.replies.get(idx).copied().unwrap_or("").to_string())
        }

        fn model_id(&self) -> &str {
            "scripted"
        }
    }

    #[test]
    fn extracts_first_balanced_json_object_amid_prose() {
        let raw = "Sure, here you go: {\"start\": \"2025-01-01\", \"end\": \"2025-01-02\"} thanks!";
        let extracted = extract_first_json_object(raw).unwrap();
        assert_eq!(extracted, "{\"start\": \"2025-01-01\", \"end\": \"2025-01-02\"}");
    }

    #[test]
    fn rejects_interval_where_start_is_after_end() {
        let raw = r#"{"start": "2025-01-10", "end": "2025-01-01", "intent": "view", "is_shift_query": true, "rationale": "x"}"#;
        assert!(parse_and_validate(raw).is_none());
    }

    #[tokio::test]
    async fn succeeds_on_first_valid_reply() {
        let chat = Arc::new(ScriptedChat {
            replies: vec![r#"{"start": "2025-06-01", "end": "2025-06-03", "intent": "cancel", "is_shift_query": true, "rationale": "next week"}"#],
            call_count: AtomicUsize::new(0),
        });
        let reasoner = DateReasoner::new(chat, NaiveDate::from_ymd_opt(2025, 5, 30));
        let result = reasoner.reason("cancel my shift next week").await;
        assert_eq!(result.intent, Intent::Cancel);
        assert_eq!(result.rationale, "next week");
    }

    #[tokio::test]
    async fn falls_back_to_default_after_two_bad_replies() {
        let chat = Arc::new(ScriptedChat {
            replies: vec!["not json at all", "still not json"],
            call_count: AtomicUsize::new(0),
        });
        let today = NaiveDate::from_ymd_opt(2025, 5, 30).unwrap();
        let reasoner = DateReasoner::new(chat, Some(today));
        let result = reasoner.reason("whenever").await;
        assert_eq!(result.rationale, "default");
        assert_eq!(result.start, today);
        assert_eq!(result.end, today + Days::new(7));
        assert_eq!(result.intent, Intent::Unknown);
    }

    #[tokio::test]
    async fn retries_once_then_succeeds() {
        let chat = Arc::new(ScriptedChat {
            replies: vec![
                "garbage",
                r#"{"start": "2025-06-01", "end": "2025-06-01", "intent": "view", "is_shift_query": false, "rationale": "retry worked"}"#,
            ],
            call_count: AtomicUsize::new(0),
        });
        let reasoner = DateReasoner::new(chat, NaiveDate::from_ymd_opt(2025, 5, 30));
        let result = reasoner.reason("today").await;
        assert_eq!(result.rationale, "retry worked");
    }
}
