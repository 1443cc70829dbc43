//! Core request types for songboard.
//!
//! This module defines the song request record as stored in the request
//! channel, and the write-side shape produced by a submission.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Label shown for a request whose timestamp has not been assigned yet.
pub const PENDING_TIME_LABEL: &str = "--:--";

/// Opaque identifier assigned by storage when a request is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh, never reused identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Wrap an identifier read back from storage.
    #[must_use]
    pub fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which submit action produced a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitKind {
    /// The regular "Send Request" action.
    #[default]
    Normal,
    /// The "Request & Play NOW" action.
    Priority,
}

impl SubmitKind {
    /// Whether this action marks the request as priority.
    #[must_use]
    pub fn is_priority(self) -> bool {
        matches!(self, Self::Priority)
    }
}

impl std::fmt::Display for SubmitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Priority => write!(f, "priority"),
        }
    }
}

/// How `created_at` is filled in when a request is appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timestamp {
    /// Assign the storage clock's wall time at commit.
    #[default]
    Server,
    /// Use a caller-supplied time.
    Client(DateTime<Utc>),
}

/// A song request as stored in the request channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Storage-assigned identifier.
    pub id: RequestId,

    /// Song and artist, never empty.
    pub song: String,

    /// Optional dedication or message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Commit time, `None` while pending.
    pub created_at: Option<DateTime<Utc>>,

    /// Set only on priority submissions. Advisory, never used for ordering.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub priority: bool,
}

impl Request {
    /// Format the creation time as local `HH:MM`.
    #[must_use]
    pub fn time_label(&self) -> String {
        format_time(self.created_at, &Local)
    }
}

/// Format an optional timestamp as `HH:MM` in the given timezone.
///
/// Pending timestamps render as [`PENDING_TIME_LABEL`].
#[must_use]
pub fn format_time<Tz>(ts: Option<DateTime<Utc>>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    match ts {
        Some(ts) => ts.with_timezone(tz).format("%H:%M").to_string(),
        None => PENDING_TIME_LABEL.to_string(),
    }
}

/// A validated request waiting to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequest {
    /// Trimmed, non-empty song text.
    pub song: String,
    /// Trimmed note, `None` when blank.
    pub note: Option<String>,
    /// Priority marker.
    pub priority: bool,
    /// Timestamp mode.
    pub created_at: Timestamp,
}

impl NewRequest {
    /// Build a request from raw form input.
    ///
    /// Trims both fields; a blank note becomes `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySong`] if the song is blank after trimming.
    pub fn from_input(song: &str, note: &str, kind: SubmitKind) -> Result<Self> {
        let song = song.trim();
        if song.is_empty() {
            return Err(Error::EmptySong);
        }

        let note = note.trim();
        Ok(Self {
            song: song.to_string(),
            note: (!note.is_empty()).then(|| note.to_string()),
            priority: kind.is_priority(),
            created_at: Timestamp::Server,
        })
    }

    /// Use a caller-supplied timestamp instead of the server clock.
    #[must_use]
    pub fn with_client_time(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Timestamp::Client(at);
        self
    }
}
