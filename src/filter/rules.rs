//! Rejection stages, evaluated in fixed order.

use std::collections::HashSet;

use crate::db::Notification;

/// Title the source uses when the app itself is the sender, which marks
/// a non-conversational system notification.
pub const SYSTEM_ALERT_TITLE: &str = "Microsoft Teams";

/// Bodies of known non-conversational notifications, matched by literal
/// prefix or exact equality, in order. Matching is case-sensitive and
/// English-only; both limitations are accepted.
pub const NOISE_PATTERNS: &[&str] = &[
    // reactions
    "Liked",
    "Loved",
    "Laughed at",
    "Emphasized",
    "Disliked",
    // call lifecycle
    "Missed call",
    "Incoming call",
    "Call ended",
    // meeting lifecycle
    "Meeting started",
    "Meeting ended",
    "Join the meeting",
    // membership changes
    "You have been added to",
    "You have been removed from",
    // typing indicator
    "Typing",
];

/// Why a notification was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// `app` is not in the configured allow-list.
    SourceNotAllowed,
    /// Title or body is empty after trimming.
    Incomplete,
    /// Title matches the app-as-sender sentinel.
    SystemAlert,
    /// Body matches a known non-conversational phrase.
    Noise,
}

/// Evaluate the rejection stages in order, stopping at the first hit.
///
/// Returns `None` when the notification should be classified and
/// forwarded.
#[must_use]
pub fn evaluate(notification: &Notification, allowed_apps: &HashSet<String>) -> Option<Rejection> {
    if !allowed_apps.contains(&notification.app) {
        return Some(Rejection::SourceNotAllowed);
    }

    let title = notification.title.trim();
    let body = notification.body.trim();
    if title.is_empty() || body.is_empty() {
        return Some(Rejection::Incomplete);
    }

    if title == SYSTEM_ALERT_TITLE {
        return Some(Rejection::SystemAlert);
    }

    if NOISE_PATTERNS.iter().any(|phrase| body.starts_with(phrase)) {
        return Some(Rejection::Noise);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teams_apps() -> HashSet<String> {
        ["com.microsoft.teams2"].into_iter().map(String::from).collect()
    }

    fn notification(title: &str, body: &str) -> Notification {
        Notification {
            rec_id: 1,
            app: "com.microsoft.teams2".to_string(),
            title: title.to_string(),
            subtitle: String::new(),
            body: body.to_string(),
            timestamp: 0,
        }
    }

    #[test]
    fn test_conversational_message_passes() {
        let n = notification("Alice", "lunch at noon?");
        assert_eq!(evaluate(&n, &teams_apps()), None);
    }

    #[test]
    fn test_unlisted_app_rejected_first() {
        let mut n = notification("", "");
        n.app = "com.apple.mail".to_string();
        assert_eq!(evaluate(&n, &teams_apps()), Some(Rejection::SourceNotAllowed));
    }

    #[test]
    fn test_empty_title_rejected() {
        let n = notification("   ", "hello");
        assert_eq!(evaluate(&n, &teams_apps()), Some(Rejection::Incomplete));
    }

    #[test]
    fn test_empty_body_rejected() {
        let n = notification("Alice", "  \n ");
        assert_eq!(evaluate(&n, &teams_apps()), Some(Rejection::Incomplete));
    }

    #[test]
    fn test_system_alert_title_rejected_regardless_of_body() {
        let n = notification("Microsoft Teams", "You have 3 unread messages");
        assert_eq!(evaluate(&n, &teams_apps()), Some(Rejection::SystemAlert));
    }

    #[test]
    fn test_system_alert_title_trimmed_before_compare() {
        let n = notification("  Microsoft Teams  ", "anything");
        assert_eq!(evaluate(&n, &teams_apps()), Some(Rejection::SystemAlert));
    }

    #[test]
    fn test_exact_noise_body_rejected() {
        let n = notification("Alice", "Liked");
        assert_eq!(evaluate(&n, &teams_apps()), Some(Rejection::Noise));
    }

    #[test]
    fn test_noise_prefix_rejected() {
        let n = notification("Alice", "Liked your message");
        assert_eq!(evaluate(&n, &teams_apps()), Some(Rejection::Noise));

        let n = notification("Bob", "Missed call from Bob");
        assert_eq!(evaluate(&n, &teams_apps()), Some(Rejection::Noise));
    }

    #[test]
    fn test_noise_match_is_case_sensitive() {
        // Documented limitation: "liked" is not "Liked".
        let n = notification("Alice", "liked that idea, let's do it");
        assert_eq!(evaluate(&n, &teams_apps()), None);
    }

    #[test]
    fn test_noise_in_mid_body_passes() {
        let n = notification("Alice", "She Liked the proposal");
        assert_eq!(evaluate(&n, &teams_apps()), None);
    }

    #[test]
    fn test_stage_order_allow_list_before_completeness() {
        let mut n = notification("", "");
        n.app = "com.other".to_string();
        // Both stages would reject; the allow-list fires first.
        assert_eq!(evaluate(&n, &teams_apps()), Some(Rejection::SourceNotAllowed));
    }

    #[test]
    fn test_determinism() {
        let n = notification("Alice", "see you @3pm");
        let apps = teams_apps();
        let first = evaluate(&n, &apps);
        for _ in 0..10 {
            assert_eq!(evaluate(&n, &apps), first);
        }
    }
}
