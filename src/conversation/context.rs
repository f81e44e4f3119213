//! Per-session working memory for the action-tag handlers.

use crate::workflow::{ShiftRecord, StaffRecord};

#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    pub current_shifts: Vec<ShiftRecord>,
    pub selected_shift: Option<ShiftRecord>,
    pub staff_info: Option<StaffRecord>,
    pub is_cancellation: bool,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cleared on session start, on every successful cancellation
    /// submission, and on explicit reset.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn find_shift(&self, shift_id: &str) -> Option<&ShiftRecord> {
        self.current_shifts
            .iter()
            .find(|shift| shift.shift_id == shift_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn shift(id: &str) -> ShiftRecord {
        ShiftRecord {
            shift_id: id.to_string(),
            client_name: "ABC".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1),
            time: "09:00".to_string(),
            shift_type: "standard".to_string(),
        }
    }

    #[test]
    fn find_shift_matches_by_id() {
        let mut ctx = ConversationContext::new();
        ctx.current_shifts = vec![shift("s1"), shift("s2")];
        assert_eq!(ctx.find_shift("s2").unwrap().shift_id, "s2");
        assert!(ctx.find_shift("s3").is_none());
    }

    #[test]
    fn reset_clears_everything() {
        let mut ctx = ConversationContext::new();
        ctx.current_shifts = vec![shift("s1")];
        ctx.is_cancellation = true;
        ctx.reset();
        assert!(ctx.current_shifts.is_empty());
        assert!(!ctx.is_cancellation);
    }
}
