use async_trait::async_trait;
use thiserror::Error;

/// Custom error type for snapshot-index lookups
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SnapshotIndexError {
    /// Transport-level failure while reaching the index
    #[error("CDX request failed: {0}")]
    Transport(String),

    /// The index answered with a non-200 status
    #[error("CDX API returned status {0}")]
    Status(u16),

    /// The index has no capture on or after the requested date
    #[error("no archived version found for {0}")]
    NoSnapshot(String),

    /// The response rows did not have the expected array-of-arrays shape
    #[error("invalid CDX response format")]
    InvalidFormat,

    /// The capture timestamp was missing or not a 14-digit string
    #[error("invalid timestamp in CDX response")]
    InvalidTimestamp,
}

/// Result type alias for snapshot-index operations
pub type SnapshotIndexResult<T> = Result<T, SnapshotIndexError>;

/// SnapshotIndex defines the port (interface) for the date-indexed capture
/// lookup used to time-shift a destination URL.
#[async_trait]
pub trait SnapshotIndex: Send + Sync + 'static {
    /// Look up the earliest successful HTML capture of `destination` on or
    /// after `from_date` (YYYYMMDD).
    ///
    /// # Returns
    /// The capture timestamp as a 14-digit string, or an error when the
    /// index is unreachable, answers non-200, has no capture, or returns a
    /// malformed row.
    async fn earliest_capture(
        &self,
        destination: &str,
        from_date: &str,
    ) -> SnapshotIndexResult<String>;
}
