use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, WrapErr};
use serde_json::Value;

use crate::ports::snapshot_index::{SnapshotIndex, SnapshotIndexError, SnapshotIndexResult};

/// Snapshot-index adapter for the Wayback CDX API.
///
/// Uses a dedicated reqwest client with a 30s connection timeout and a 90s
/// overall request timeout; neither is configurable per call. One lookup is
/// one GET, restricted server-side to successful HTML captures and limited
/// to a single result row.
pub struct CdxClient {
    client: reqwest::Client,
    endpoint: String,
}

impl CdxClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(90))
            .build()
            .wrap_err("Failed to build CDX HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    fn lookup_url(&self, destination: &str, from_date: &str) -> String {
        format!(
            "{}?url={}&from={}&filter=statuscode:200&filter=mimetype:text/html&limit=1&output=json",
            self.endpoint,
            urlencoding::encode(destination),
            from_date
        )
    }
}

#[async_trait]
impl SnapshotIndex for CdxClient {
    async fn earliest_capture(
        &self,
        destination: &str,
        from_date: &str,
    ) -> SnapshotIndexResult<String> {
        let lookup = self.lookup_url(destination, from_date);
        tracing::debug!(url = %lookup, "calling CDX API");

        let response = self
            .client
            .get(&lookup)
            .send()
            .await
            .map_err(|e| SnapshotIndexError::Transport(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SnapshotIndexError::Status(status.as_u16()));
        }

        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|_| SnapshotIndexError::InvalidFormat)?;

        // First row is the column header; data rows follow.
        if rows.len() < 2 {
            return Err(SnapshotIndexError::NoSnapshot(destination.to_string()));
        }

        let row = rows[1]
            .as_array()
            .filter(|row| row.len() >= 2)
            .ok_or(SnapshotIndexError::InvalidFormat)?;

        let timestamp = row[1].as_str().ok_or(SnapshotIndexError::InvalidTimestamp)?;
        if timestamp.len() != 14 || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SnapshotIndexError::InvalidTimestamp);
        }

        Ok(timestamp.to_string())
    }
}
