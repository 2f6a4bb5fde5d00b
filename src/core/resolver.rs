//! Destination-to-capture URL resolution.
use std::sync::Arc;

use crate::{
    config::ArchiveConfig,
    ports::snapshot_index::{SnapshotIndex, SnapshotIndexResult},
};

/// Resolves a destination URL to the concrete capture URL closest on or
/// after the configured date, via a single snapshot-index lookup. Only the
/// first matching capture is considered; results are never cached across
/// requests.
pub struct ArchiveUrlResolver {
    index: Arc<dyn SnapshotIndex>,
    archive: ArchiveConfig,
}

impl ArchiveUrlResolver {
    pub fn new(index: Arc<dyn SnapshotIndex>, archive: ArchiveConfig) -> Self {
        Self { index, archive }
    }

    /// Resolve `destination` to a capture URL on or after `date` (YYYYMMDD).
    pub async fn resolve(&self, destination: &str, date: &str) -> SnapshotIndexResult<String> {
        let timestamp = self.index.earliest_capture(destination, date).await?;
        let capture_url = format!("{}{}/{}", self.archive.web_prefix, timestamp, destination);
        tracing::debug!(%destination, %timestamp, %capture_url, "resolved archive capture");
        Ok(capture_url)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::ports::snapshot_index::SnapshotIndexError;

    struct FixedIndex(&'static str);

    #[async_trait]
    impl SnapshotIndex for FixedIndex {
        async fn earliest_capture(
            &self,
            _destination: &str,
            _from_date: &str,
        ) -> SnapshotIndexResult<String> {
            Ok(self.0.to_string())
        }
    }

    struct EmptyIndex;

    #[async_trait]
    impl SnapshotIndex for EmptyIndex {
        async fn earliest_capture(
            &self,
            destination: &str,
            _from_date: &str,
        ) -> SnapshotIndexResult<String> {
            Err(SnapshotIndexError::NoSnapshot(destination.to_string()))
        }
    }

    #[tokio::test]
    async fn test_capture_url_is_prefix_timestamp_destination() {
        let resolver = ArchiveUrlResolver::new(
            Arc::new(FixedIndex("20020405123000")),
            ArchiveConfig::default(),
        );

        let url = resolver
            .resolve("http://example.com/", "20020401")
            .await
            .unwrap();
        assert_eq!(
            url,
            "http://web.archive.org/web/20020405123000/http://example.com/"
        );
    }

    #[tokio::test]
    async fn test_lookup_errors_are_propagated() {
        let resolver = ArchiveUrlResolver::new(Arc::new(EmptyIndex), ArchiveConfig::default());

        let err = resolver
            .resolve("http://missing.example/", "20020401")
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotIndexError::NoSnapshot(_)));
        assert!(err.to_string().contains("no archived version found"));
    }
}
