use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique identifier for a media asset (UUIDv7 for time-sortability).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaId(Uuid);

impl MediaId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for MediaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Media asset
// ---------------------------------------------------------------------------

/// Kind of media held by an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Audio,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Video => write!(f, "video"),
            MediaType::Audio => write!(f, "audio"),
        }
    }
}

/// A stored media asset. Immutable after creation; the streaming path
/// only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: MediaId,
    pub title: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    /// Location reference understood by the file store, e.g. `/files/abc.mp4`.
    pub file_url: String,
    pub created_at: DateTime<Utc>,
}

impl MediaAsset {
    pub fn new(title: String, media_type: MediaType, file_url: String) -> Self {
        Self {
            id: MediaId::new(),
            title,
            media_type,
            file_url,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// View log
// ---------------------------------------------------------------------------

/// One admitted view of an asset. Append-only; never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewLogEntry {
    pub media_id: MediaId,
    /// Client identity: forwarded-header value or the raw connection address.
    pub viewed_by: String,
    pub timestamp: DateTime<Utc>,
}

impl ViewLogEntry {
    pub fn new(media_id: MediaId, viewed_by: String) -> Self {
        Self {
            media_id,
            viewed_by,
            timestamp: Utc::now(),
        }
    }

    /// Calendar date of the view in fixed sortable `YYYY-MM-DD` form.
    pub fn day(&self) -> String {
        self.timestamp.format("%Y-%m-%d").to_string()
    }
}

/// Current epoch time in milliseconds. Token expiry and rate windows both
/// work in this unit.
pub fn now_epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}
