//! Binary property-list decoder for notification record blobs.
//!
//! Each row in the `record` table carries a binary plist. The fields of
//! interest live in two places: `app` and `date` at the top level, and
//! the human-readable `titl`/`subt`/`body` strings nested under the
//! `req` dictionary.

use std::io::Cursor;

use plist::{Dictionary, Value};

/// Seconds between the Unix epoch (1970) and the Cocoa epoch (2001).
pub const COCOA_TO_UNIX_OFFSET: i64 = 978_307_200;

/// Decoded notification payload.
///
/// Every field has a defined default, resolved here rather than by the
/// consumer: absent strings decode to `""`, an absent date to a zero
/// timestamp. The `app` field is advisory only; the record reader
/// overrides it with the join-resolved bundle identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub app: String,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    /// Unix seconds; 0 when the record carried no date.
    pub timestamp: i64,
}

/// Errors from payload decoding.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    /// The blob is not a parseable property list.
    #[error("Not a parseable property list: {0}")]
    Plist(#[from] plist::Error),

    /// The plist parsed but its root is not a dictionary.
    #[error("Property list root is not a dictionary")]
    NotADictionary,
}

/// Decode one record blob into a [`Payload`].
///
/// Accepts binary and XML property lists (the reader auto-detects the
/// format).
///
/// # Errors
///
/// Returns an error if the blob is not a property list or its root is
/// not a dictionary. Never returns a partial payload.
pub fn decode(blob: &[u8]) -> Result<Payload, DecodeError> {
    let value = Value::from_reader(Cursor::new(blob))?;
    let root = value.as_dictionary().ok_or(DecodeError::NotADictionary)?;

    let req = root.get("req").and_then(Value::as_dictionary);

    Ok(Payload {
        app: string_field(Some(root), "app"),
        title: string_field(req, "titl"),
        subtitle: string_field(req, "subt"),
        body: string_field(req, "body"),
        timestamp: timestamp_field(root),
    })
}

/// Extract a string field, empty when absent or not a string.
fn string_field(dict: Option<&Dictionary>, key: &str) -> String {
    dict.and_then(|d| d.get(key))
        .and_then(Value::as_string)
        .unwrap_or_default()
        .to_string()
}

/// Extract the Cocoa-epoch date and convert it to Unix seconds.
///
/// The source stores the date as a real (occasionally an integer);
/// anything else counts as missing and maps to 0.
#[allow(clippy::cast_possible_truncation)]
fn timestamp_field(root: &Dictionary) -> i64 {
    let cocoa = match root.get("date") {
        Some(Value::Real(secs)) => *secs as i64,
        Some(Value::Integer(n)) => match n.as_signed() {
            Some(secs) => secs,
            None => return 0,
        },
        _ => return 0,
    };
    cocoa + COCOA_TO_UNIX_OFFSET
}
