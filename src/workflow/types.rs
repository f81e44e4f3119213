//! Data model shared by the Shift Workflow and the Conversation Core's
//! Context.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftRecord {
    pub shift_id: String,
    pub client_name: String,
    /// `None` for a date that failed to parse; such records are retained
    /// in `current_shifts` but excluded from date-range filtering.
    pub date: Option<NaiveDate>,
    pub time: String,
    pub shift_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffRecord {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub team: String,
    pub mobile: String,
}

/// Closed `[start, end]` interval, `start <= end`, both in the service's
/// local timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    Cancel,
    View,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct LookupResult {
    pub staff: StaffRecord,
    pub interval: DateInterval,
    pub all_shifts: Vec<ShiftRecord>,
    pub filtered_shifts: Vec<ShiftRecord>,
    pub intent: Intent,
}

/// Strips a title prefix of the form `"<Title>. <Rest>"` with
/// Title in {Ms, Mr, Mrs, Dr, Prof}.
pub fn strip_title_prefix(raw_name: &str) -> String {
    const TITLES: &[&str] = &["Ms", "Mr", "Mrs", "Dr", "Prof"];
    for title in TITLES {
        let prefix = format!("{title}. ");
        if let Some(rest) = raw_name.strip_prefix(&prefix) {
            return rest.to_string();
        }
    }
    raw_name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_titles() {
        assert_eq!(strip_title_prefix("Ms. Alannah Courtnay"), "Alannah Courtnay");
        assert_eq!(strip_title_prefix("Dr. John Smith"), "John Smith");
        assert_eq!(strip_title_prefix("Prof. Jane Doe"), "Jane Doe");
    }

    #[test]
    fn leaves_untitled_names_unchanged() {
        assert_eq!(strip_title_prefix("Alannah Courtnay"), "Alannah Courtnay");
    }
}
