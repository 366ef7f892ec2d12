//! Message-type classification and truncation tagging.

use serde::Serialize;

use crate::db::Notification;

/// Characters that separate a channel name from its team in a subtitle.
const CHANNEL_SEPARATORS: [char; 2] = ['|', '>'];

/// Body length at which the notification preview may have been cut off.
const TRUNCATION_THRESHOLD: usize = 150;

/// Characters that end a complete sentence.
const SENTENCE_TERMINATORS: [char; 6] = ['.', '!', '?', '"', '\'', ')'];

/// Where an admitted notification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Direct,
    Channel,
    Mention,
}

/// A notification that passed every rejection stage, tagged for
/// delivery. Built and consumed within one pass, never persisted.
#[derive(Debug, Clone)]
pub struct Classified {
    pub notification: Notification,
    pub message_type: MessageType,
    pub truncated: bool,
}

impl Classified {
    /// Tag an admitted notification.
    #[must_use]
    pub fn new(notification: Notification) -> Self {
        let message_type = classify(&notification);
        let truncated = is_truncated(&notification.body);
        Self {
            notification,
            message_type,
            truncated,
        }
    }
}

/// Classify an admitted notification.
///
/// A mention wins over everything. A subtitle that looks like a channel
/// ("General | Team X") or that differs from the sender name means a
/// channel post; anything else is a direct message.
#[must_use]
pub fn classify(notification: &Notification) -> MessageType {
    if notification.body.contains('@') {
        return MessageType::Mention;
    }

    let subtitle = notification.subtitle.trim();
    if !subtitle.is_empty() {
        if subtitle.contains(&CHANNEL_SEPARATORS[..]) {
            return MessageType::Channel;
        }
        if subtitle != notification.title.trim() {
            return MessageType::Channel;
        }
    }

    MessageType::Direct
}

/// Whether the body looks cut off by the notification preview budget.
///
/// The preview hard-truncates long bodies at a fixed character budget
/// without an ellipsis marker, so length plus a missing sentence
/// terminator is the only available signal.
#[must_use]
pub fn is_truncated(body: &str) -> bool {
    if body.chars().count() < TRUNCATION_THRESHOLD {
        return false;
    }
    body.chars()
        .last()
        .is_some_and(|last| !SENTENCE_TERMINATORS.contains(&last))
}
