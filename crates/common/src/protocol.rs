// Request/response contracts for the cuesync.v1 session protocol.
//
// All operations are request/response over a single base address. Field
// names are camelCase on the wire. Times cross the wire in whole
// milliseconds; cue text crosses HTML-escaped with the literal line
// break marker (see `textcodec`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Success sentinel for Start/Join responses.
pub const MSG_OK: &str = "OK";

/// Conflict sentinel: the session identifier is already in use remotely.
/// Load-bearing; Restart pivots to Rejoin when it sees this message.
pub const MSG_SESSION_ALREADY_RUNNING: &str = "Session is already running";

/// A cue line in wire form: whole-millisecond times, escaped text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireLine {
    pub index: i32,
    pub start: i64,
    pub end: i64,
    pub text: String,
}

/// A session participant in wire form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireUser {
    pub user_name: String,
    pub ip: String,
    pub last_activity: DateTime<Utc>,
}

/// A server-reported line change in wire form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireUpdate {
    pub user_name: String,
    pub index: i32,
    pub start: i64,
    pub end: i64,
    pub text: String,
    pub action: String,
    pub timestamp: i64,
}

/// Start/end/text triple for UpdateLine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireSequence {
    pub start: i64,
    pub end: i64,
    pub text: String,
}

// ── Start ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub session_id: String,
    pub user_name: String,
    pub file_name: String,
    pub subtitle: Vec<WireLine>,
    pub original_subtitle: Vec<WireLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    /// The caller's participant record as the service sees it.
    pub user: Option<WireUser>,
    pub message: String,
}

// ── Join ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub session_id: String,
    pub user_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    /// Current participants. The service appends the newly joined user
    /// last; callers depend on that ordering.
    pub users: Vec<WireUser>,
    pub message: String,
}

// ── Leave ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub session_id: String,
    pub user_name: String,
}

// ── Subtitle pulls ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GetSubtitleRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GetSubtitleResponse {
    pub subtitle: Vec<WireLine>,
    pub file_name: String,
    /// Server clock at the time of this snapshot, unix milliseconds.
    pub update_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GetOriginalSubtitleResponse {
    pub subtitle: Vec<WireLine>,
}

// ── GetUpdates ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GetUpdatesRequest {
    pub session_id: String,
    pub user_name: String,
    pub last_update_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GetUpdatesResponse {
    pub updates: Vec<WireUpdate>,
    pub message: String,
    pub new_update_time: i64,
    pub number_of_lines: i32,
}

// ── Pushes ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub session_id: String,
    pub user_name: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLineRequest {
    pub session_id: String,
    pub user_name: String,
    pub index: i32,
    pub sequence: WireSequence,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InsertLineRequest {
    pub session_id: String,
    pub user_name: String,
    pub index: i32,
    pub start: i64,
    pub end: i64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteLinesRequest {
    pub session_id: String,
    pub user_name: String,
    pub indices: Vec<i32>,
}

/// Acknowledgement body shared by the push operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AckResponse {
    pub ok: bool,
}
