// Core domain types shared across all cuesync crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::WireLine;
use crate::textcodec;

/// One unit of the shared timed-text document.
///
/// Times are kept in fractional milliseconds locally; they are truncated
/// to whole milliseconds when converted for the wire. Text is unescaped
/// with native newlines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CueLine {
    pub start_ms: f64,
    pub end_ms: f64,
    pub text: String,
}

impl CueLine {
    pub fn new(start_ms: f64, end_ms: f64, text: impl Into<String>) -> Self {
        Self { start_ms, end_ms, text: text.into() }
    }

    /// Convert to the wire shape at the given document position.
    pub fn to_wire(&self, index: usize) -> WireLine {
        WireLine {
            index: index as i32,
            start: self.start_ms as i64,
            end: self.end_ms as i64,
            text: textcodec::encode(&self.text),
        }
    }

    /// Convert back from the wire shape, decoding the text.
    pub fn from_wire(line: &WireLine) -> Self {
        Self {
            start_ms: line.start as f64,
            end_ms: line.end as f64,
            text: textcodec::decode(&line.text),
        }
    }
}

/// A named participant in a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub user_name: String,
    pub ip: String,
    pub last_activity: DateTime<Utc>,
}

/// An immutable chat message, ordered by arrival.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatEntry {
    pub user_name: String,
    pub text: String,
}

/// Kind of a per-line mutation, as reported over the wire and recorded
/// in the activity log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateAction {
    Update,
    Insert,
    Delete,
    /// Free-form label for anything the three structural kinds don't cover.
    Other(String),
}

impl UpdateAction {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Update => "update",
            Self::Insert => "insert",
            Self::Delete => "delete",
            Self::Other(label) => label,
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "update" => Self::Update,
            "insert" => Self::Insert,
            "delete" => Self::Delete,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A server-reported change pulled via GetUpdates, with text already
/// decoded. Consumed immediately by the caller's merge step.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpdate {
    pub user_name: String,
    pub index: usize,
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    pub action: UpdateAction,
    pub timestamp_ms: i64,
}
