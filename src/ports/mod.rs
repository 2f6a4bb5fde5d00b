pub mod snapshot_index;
pub mod upstream_client;

pub use snapshot_index::{SnapshotIndex, SnapshotIndexError, SnapshotIndexResult};
pub use upstream_client::{UpstreamClient, UpstreamError, UpstreamResult};
