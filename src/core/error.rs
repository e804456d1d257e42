use thiserror::Error;

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

/// Errors originating from the storage collaborators (record store and
/// file store).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file not found: {location}")]
    FileNotFound { location: String },

    #[error("invalid file location: {location}")]
    InvalidLocation { location: String },

    #[error("empty upload rejected")]
    EmptyUpload,

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Stream request errors
// ---------------------------------------------------------------------------

/// Outcome of a failed stream, view or analytics request. Each variant is
/// a deterministic result of the signer / rate-limiter / range-resolver
/// logic, never a panic on bad input.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Expired token or signature mismatch. No retry, no state mutation.
    #[error("invalid or expired stream token")]
    InvalidToken,

    #[error("media not found: {media_id}")]
    MediaNotFound { media_id: String },

    #[error("media file missing: {location}")]
    FileMissing { location: String },

    /// Denied by the sliding-window limiter. The caller may retry after
    /// `retry_after_secs`.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("range not satisfiable: start {start} beyond length {total_len}")]
    RangeNotSatisfiable { start: u64, total_len: u64 },

    #[error("storage backend error: {0}")]
    Storage(#[from] StorageError),
}

impl StreamError {
    /// Wrap a failure from the file-open path, promoting a missing
    /// underlying file to its own variant.
    pub fn from_file_open(err: StorageError) -> Self {
        match err {
            StorageError::FileNotFound { location } => StreamError::FileMissing { location },
            other => StreamError::Storage(other),
        }
    }

    /// Map to the HTTP status code of the response contract.
    pub fn status_code(&self) -> u16 {
        match self {
            StreamError::InvalidToken => 403,
            StreamError::MediaNotFound { .. } => 404,
            StreamError::FileMissing { .. } => 404,
            StreamError::RateLimited { .. } => 429,
            StreamError::RangeNotSatisfiable { .. } => 416,
            StreamError::Storage(StorageError::FileNotFound { .. }) => 404,
            StreamError::Storage(StorageError::InvalidLocation { .. }) => 404,
            StreamError::Storage(StorageError::EmptyUpload) => 400,
            StreamError::Storage(StorageError::Io(_)) => 500,
        }
    }

    /// Return the error code string for JSON responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            StreamError::InvalidToken => "invalid_token",
            StreamError::MediaNotFound { .. } => "media_not_found",
            StreamError::FileMissing { .. } => "file_missing",
            StreamError::RateLimited { .. } => "rate_limited",
            StreamError::RangeNotSatisfiable { .. } => "range_not_satisfiable",
            StreamError::Storage(StorageError::EmptyUpload) => "empty_upload",
            StreamError::Storage(_) => "storage_error",
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating configuration at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("signing secret is absent or empty; set signing.secret or MEDIAGATE_SIGNING_SECRET")]
    MissingSigningSecret,

    #[error("failed to read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("failed to parse {path}: {reason}")]
    Unparseable { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_match_contract() {
        assert_eq!(StreamError::InvalidToken.status_code(), 403);
        assert_eq!(
            StreamError::MediaNotFound {
                media_id: "x".into()
            }
            .status_code(),
            404
        );
        assert_eq!(
            StreamError::RateLimited {
                retry_after_secs: 5
            }
            .status_code(),
            429
        );
        assert_eq!(
            StreamError::RangeNotSatisfiable {
                start: 10,
                total_len: 5
            }
            .status_code(),
            416
        );
    }

    #[test]
    fn test_missing_file_maps_to_not_found() {
        let err = StreamError::Storage(StorageError::FileNotFound {
            location: "/files/gone.mp4".to_string(),
        });
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.error_code(), "storage_error");
    }

    #[test]
    fn test_from_file_open_promotes_missing_file() {
        let err = StreamError::from_file_open(StorageError::FileNotFound {
            location: "/files/gone.mp4".to_string(),
        });
        assert!(matches!(err, StreamError::FileMissing { .. }));
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.error_code(), "file_missing");

        let err = StreamError::from_file_open(StorageError::EmptyUpload);
        assert!(matches!(err, StreamError::Storage(StorageError::EmptyUpload)));
    }
}
