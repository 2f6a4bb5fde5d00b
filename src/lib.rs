//! timegate - a date-shifting forwarding HTTP proxy.
//!
//! timegate turns an ordinary HTTP proxy setting into a time machine: every
//! request is resolved against a date-indexed snapshot archive and forwarded
//! to the capture closest on or after the configured date. One fixed origin
//! is proxied directly over HTTPS instead. HTML responses are rewritten on
//! the way back to strip injected archive chrome or heavyweight screenshot
//! blocks, and every upstream call runs inside a bounded retry loop with
//! exponential backoff.
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use timegate::{
//!     adapters::CdxClient,
//!     config::ProxyConfig,
//!     core::{ArchiveUrlResolver, RequestRouter},
//! };
//!
//! # fn main() -> eyre::Result<()> {
//! let config = ProxyConfig::default();
//! let index = Arc::new(CdxClient::new(config.archive.cdx_endpoint.clone())?);
//! let resolver = ArchiveUrlResolver::new(index, config.archive.clone());
//! let router = RequestRouter::new(
//!     resolver,
//!     config.archive.clone(),
//!     config.fixed_origin.clone(),
//!     config.snapshot_date.clone(),
//! );
//! // Wire the router and a forwarder into the provided HttpHandler adapter
//! // (see the binary crate for the full assembly).
//! # let _ = router;
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations)
//! while keeping business logic inside `core`. Configuration is threaded
//! explicitly into each constructor; nothing reads ambient process state.
//!
//! # Error Handling
//! Fallible wiring returns `eyre::Result<T>`; domain failures use dedicated
//! error enums on the ports and core. Request handling itself never fails:
//! every error path degrades to a response for the client.
// Re-export public modules with explicit visibility controls
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

// These modules are implementation details and should not be directly used by users
pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{CdxClient, HttpHandler, UpstreamClientAdapter},
    core::{ArchiveUrlResolver, RequestRouter, RetryingForwarder},
    ports::{snapshot_index::SnapshotIndex, upstream_client::UpstreamClient},
    utils::GracefulShutdown,
};
