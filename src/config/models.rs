//! Configuration data structures for timegate.
//!
//! The proxy is configured entirely from CLI flags; these types are the
//! serde‑friendly value objects those flags are assembled into. Every
//! component receives the slice of configuration it needs through its
//! constructor, so nothing in the crate reads ambient process state.
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy for upstream forwarding attempts.
///
/// `max_attempts` bounds the total number of attempts including the first.
/// `initial_delay` is the sleep before the second attempt; it doubles after
/// every failed attempt (uncapped). The doubling sequence is derived locally
/// inside each `forward()` invocation, so concurrent requests never observe
/// each other's backoff state.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
        }
    }
}

/// Endpoints of the snapshot archive.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ArchiveConfig {
    /// CDX snapshot-index lookup endpoint
    pub cdx_endpoint: String,
    /// Prefix of concrete capture URLs; a capture is `<web_prefix><timestamp>/<destination>`.
    /// Also used to recognize inbound requests that already target the archive.
    pub web_prefix: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            cdx_endpoint: "http://web.archive.org/cdx/search/cdx".to_string(),
            web_prefix: "http://web.archive.org/web/".to_string(),
        }
    }
}

/// The single non-archive origin proxied directly, without date resolution.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct FixedOriginConfig {
    /// Requests whose Host contains this value are forwarded straight to it
    /// over HTTPS with path and query preserved.
    pub host: String,
}

impl Default for FixedOriginConfig {
    fn default() -> Self {
        Self {
            host: "geocities.restorativland.org".to_string(),
        }
    }
}

/// Resource limits applied while handling a single request.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest body buffered in memory for HTML rewriting. Larger declared
    /// bodies stream through unrewritten.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Top-level proxy configuration, assembled from CLI flags in `main`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProxyConfig {
    pub listen_addr: String,
    /// Target date in YYYYMMDD form; must be a real calendar date.
    pub snapshot_date: String,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub fixed_origin: FixedOriginConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            snapshot_date: "20020401".to_string(),
            retry: RetryConfig::default(),
            archive: ArchiveConfig::default(),
            fixed_origin: FixedOriginConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}
