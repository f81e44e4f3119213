//! Shift Workflow: login -> staff-by-phone lookup -> date reasoning ->
//! date-filtered shift search -> cancellation submission.

mod browser;
mod mailer;
mod totp;
mod types;

pub use browser::{BrowserError, BrowserSession, ChromiumBrowserSession};
pub use mailer::{LettreMailer, Mailer, MailerError};
pub use types::{DateInterval, Intent, LookupResult, ShiftRecord, StaffRecord};

use crate::config::Config;
use crate::date_reasoner::DateReasoner;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("staff not found for phone number")]
    StaffNotFound,
    #[error("navigation timed out: {0}")]
    NavigationTimeout(String),
    #[error("cancellation submission failed: {0}")]
    SubmissionFailed(String),
}

/// Single async entry point composing every step of the Shift Workflow.
pub struct ShiftWorkflow {
    browser: Arc<dyn BrowserSession>,
    mailer: Arc<dyn Mailer>,
    date_reasoner: DateReasoner,
    mail_subject: String,
}

impl ShiftWorkflow {
    pub fn new(
        browser: Arc<dyn BrowserSession>,
        mailer: Arc<dyn Mailer>,
        date_reasoner: DateReasoner,
        config: &Config,
    ) -> Self {
        Self {
            browser,
            mailer,
            date_reasoner,
            mail_subject: config.mail.subject.clone(),
        }
    }

    /// Steps 1-6 of each failing fast.
    pub async fn lookup(
        &self,
        caller_phone: &str,
        utterance: &str,
    ) -> Result<LookupResult, WorkflowError> {
        self.browser
            .ensure_authenticated()
            .await
            .map_err(|e| WorkflowError::AuthFailed(e.to_string()))?;

        let staff = self
            .browser
            .find_staff_by_phone(caller_phone)
            .await
            .map_err(|_| WorkflowError::StaffNotFound)?;

        let reasoning = self.date_reasoner.reason(utterance).await;
        let interval = DateInterval {
            start: reasoning.start,
            end: reasoning.end,
        };

        let all_shifts = self
            .browser
            .search_shifts(&staff.full_name, &interval)
            .await
            .map_err(|e| WorkflowError::NavigationTimeout(e.to_string()))?;

        // Local safety filter:
        // the server-side filter is trusted but not trusted completely.
        let filtered_shifts: Vec<ShiftRecord> = all_shifts
            .iter()
            .filter(|s| {
                s.date
                    .map(|d| d >= interval.start && d <= interval.end)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        Ok(LookupResult {
            staff,
            interval,
            all_shifts,
            filtered_shifts,
            intent: reasoning.intent,
        })
    }

    /// Composes and sends the cancellation-notification email.
    /// Does not mutate the site; persistence happens downstream via a
    /// separate manual workflow.
    pub async fn submit_cancellation(
        &self,
        staff: &StaffRecord,
        shift: &ShiftRecord,
        reason: Option<&str>,
    ) -> Result<(), WorkflowError> {
        let body = render_cancellation_email(staff, shift, reason);
        self.mailer
            .send(&self.mail_subject, &body)
            .await
            .map_err(|e| WorkflowError::SubmissionFailed(e.to_string()))
    }
}

/// Renders the cancellation-notification email body. The `REASON:` block
/// is omitted entirely when no reason is supplied.
fn render_cancellation_email(staff: &StaffRecord, shift: &ShiftRecord, reason: Option<&str>) -> String {
    let shift_date = shift
        .date
        .map(|d| d.format("%d-%m-%Y").to_string())
        .unwrap_or_else(|| "unknown date".to_string());

    let mut body = String::new();
    body.push_str("Requested cancellation of shift.\n\n");
    body.push_str("    STAFF:\n");
    body.push_str(&format!("        \u{b7} Name: {}\n", staff.full_name));
    body.push_str(&format!("        \u{b7} ID: {}\n", staff.id));
    body.push_str(&format!("        \u{b7} Email: {}\n", staff.email));
    body.push('\n');
    body.push_str("    SHIFT(S):\n");
    body.push_str(&format!(
        "        \u{b7} {} at {} {}\n",
        shift.client_name, shift.time, shift_date
    ));

    if let Some(reason) = reason {
        body.push('\n');
        body.push_str("    REASON:\n");
        body.push_str(&format!("        {reason}\n"));
    }

    body.push('\n');
    body.push_str("This is an auto-generated email. Please do not reply.\n");
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn staff() -> StaffRecord {
        StaffRecord {
            id: "42".to_string(),
            full_name: "Alannah Courtnay".to_string(),
            email: "alannah@example.com".to_string(),
            team: "North".to_string(),
            mobile: "0431256441".to_string(),
        }
    }

    fn shift() -> ShiftRecord {
        ShiftRecord {
            shift_id: "s123".to_string(),
            client_name: "ABC".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 12, 17),
            time: "14:00".to_string(),
            shift_type: "standard".to_string(),
        }
    }

    #[test]
    fn email_includes_reason_block_when_reason_present() {
        let body = render_cancellation_email(&staff(), &shift(), Some("I'm sick"));
        assert!(body.contains("REASON:"));
        assert!(body.contains("I'm sick"));
        assert!(body.contains("ABC at 14:00 17-12-2025"));
    }

    #[test]
    fn email_omits_reason_block_when_absent() {
        let body = render_cancellation_email(&staff(), &shift(), None);
        assert!(!body.contains("REASON:"));
    }
}
