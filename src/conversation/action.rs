//! Action tags emitted by the model inside its reply text, parsed into a
//! closed sum type instead of handled as free-form strings.

/// An opaque shift identifier, as emitted by the model inside a
/// `<CONFIRM_CANCEL>` tag.
pub type ShiftId = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    GetShifts(String),
    ConfirmCancel(ShiftId),
    Reason(String),
    Login,
    Real,
    Deny,
}

/// Tag markers, in priority order (first to match wins). Marker whitespace
/// and casing must match exactly.
const TAGS_IN_PRIORITY_ORDER: &[(&str, fn(&str) -> Action)] = &[
    ("<GETSHIFTS>", |payload| {
        Action::GetShifts(payload.trim().to_string())
    }),
    ("<CONFIRM_CANCEL>", |payload| {
        let shift_id = payload
            .trim_start()
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
        Action::ConfirmCancel(shift_id)
    }),
    ("<REASON>", |payload| Action::Reason(payload.trim().to_string())),
    ("<LOGIN>", |_| Action::Login),
    ("<REAL>", |_| Action::Real),
    ("<DENY>", |_| Action::Deny),
];

/// Parse the first (by priority, not position) recognized action tag out
/// of a raw Chat reply. Unknown tags are left for sanitization to handle
/// as plain speech.
pub fn parse(raw: &str) -> Option<Action> {
    for (marker, build) in TAGS_IN_PRIORITY_ORDER {
        if let Some(idx) = raw.find(marker) {
            let after = &raw[idx + marker.len()..];
            let payload = after.split('\n').next().unwrap_or("");
            return Some(build(payload));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_getshifts_free_form_payload() {
        let action = parse("Let me check. <GETSHIFTS> tomorrow please").unwrap();
        assert_eq!(action, Action::GetShifts("tomorrow please".to_string()));
    }

    #[test]
    fn confirm_cancel_takes_first_token_only() {
        let action = parse("<CONFIRM_CANCEL> s123, please confirm").unwrap();
        assert_eq!(action, Action::ConfirmCancel("s123,".to_string()));
    }

    #[test]
    fn reason_takes_rest_of_line() {
        let action = parse("<REASON> I'm sick and can't make it").unwrap();
        assert_eq!(
            action,
            Action::Reason("I'm sick and can't make it".to_string())
        );
    }

    #[test]
    fn priority_order_prefers_getshifts_over_deny() {
        let action = parse("<DENY> <GETSHIFTS> next week").unwrap();
        assert_eq!(action, Action::GetShifts("next week".to_string()));
    }

    #[test]
    fn no_tags_returns_none() {
        assert!(parse("Sure, I can help with that.").is_none());
    }

    #[test]
    fn login_real_deny_have_no_payload() {
        assert_eq!(parse("<LOGIN>").unwrap(), Action::Login);
        assert_eq!(parse("<REAL>").unwrap(), Action::Real);
        assert_eq!(parse("<DENY>").unwrap(), Action::Deny);
    }
}
