//! Filter and classification stages for decoded notifications.
//!
//! Everything in this module is pure: the same (notification,
//! allow-list) pair always produces the same verdict, classification,
//! and truncation flag.

mod classify;
mod rules;

pub use classify::{classify, is_truncated, Classified, MessageType};
pub use rules::{evaluate, Rejection, NOISE_PATTERNS, SYSTEM_ALERT_TITLE};
