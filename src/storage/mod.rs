pub mod fs;
pub mod memory;

use crate::core::error::StorageError;
use crate::core::types::{MediaAsset, MediaId, ViewLogEntry};

// ---------------------------------------------------------------------------
// MetadataStore trait
// ---------------------------------------------------------------------------

/// Trait-based abstraction over the record store holding media assets and
/// the view log.
///
/// Trait-based so the HTTP layer and the analytics aggregator can be unit
/// tested against `InMemoryMetadataStore` without external dependencies; a
/// database-backed implementation plugs in behind the same seam.
pub trait MetadataStore: Send + Sync {
    /// Persist a new media asset.
    fn save_media(
        &self,
        asset: MediaAsset,
    ) -> impl std::future::Future<Output = Result<MediaId, StorageError>> + Send;

    /// Look up an asset by id.
    fn find_media(
        &self,
        id: MediaId,
    ) -> impl std::future::Future<Output = Result<Option<MediaAsset>, StorageError>> + Send;

    /// Append one view-log entry. The log is append-only.
    fn append_view(
        &self,
        entry: ViewLogEntry,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// All view-log entries for an asset, in insertion order.
    fn views_for(
        &self,
        id: MediaId,
    ) -> impl std::future::Future<Output = Result<Vec<ViewLogEntry>, StorageError>> + Send;
}

// ---------------------------------------------------------------------------
// Content type helpers
// ---------------------------------------------------------------------------

/// Determine content type from file extension when the store does not
/// supply one.
pub fn content_type_for_path(path: &str) -> &'static str {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".mp4") || lower.ends_with(".m4v") {
        "video/mp4"
    } else if lower.ends_with(".webm") {
        "video/webm"
    } else if lower.ends_with(".mkv") {
        "video/x-matroska"
    } else if lower.ends_with(".mp3") {
        "audio/mpeg"
    } else if lower.ends_with(".m4a") || lower.ends_with(".aac") {
        "audio/aac"
    } else if lower.ends_with(".ogg") {
        "audio/ogg"
    } else if lower.ends_with(".wav") {
        "audio/wav"
    } else {
        "application/octet-stream"
    }
}
