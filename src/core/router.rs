//! Per-request mode classification and upstream target resolution.
//!
//! Every inbound request lands in exactly one of two modes, decided solely
//! by its host: direct HTTPS passthrough to the fixed origin, or a
//! date-resolved capture fetch from the archive. The router owns that
//! decision plus all URL derivation; forwarding and rewriting happen
//! downstream of it.
use std::fmt;

use hyper::Uri;
use thiserror::Error;
use url::Url;

use crate::{
    config::{ArchiveConfig, FixedOriginConfig},
    core::{
        redirect::{self, RedirectTarget},
        resolver::ArchiveUrlResolver,
        rewrite::RewriteHook,
    },
    ports::snapshot_index::SnapshotIndexError,
};

/// Which of the two forwarding modes produced a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    /// Direct HTTPS passthrough to the fixed origin.
    FixedOrigin,
    /// Date-resolved capture fetch from the archive.
    Archive,
}

/// Fully-qualified upstream URL plus the mode that produced it. Scheme and
/// host are guaranteed non-empty before the forwarder sees it.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub url: Url,
    pub mode: ProxyMode,
}

impl ResolvedTarget {
    fn checked(url: Url, mode: ProxyMode) -> Result<Self, RouteError> {
        if url.host_str().is_none_or(str::is_empty) {
            return Err(RouteError::InvalidTarget {
                url: url.to_string(),
                reason: "missing host".to_string(),
            });
        }
        Ok(Self { url, mode })
    }
}

impl fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Error produced while determining the upstream target. Resolution errors
/// are never retried; the handler surfaces them as a 500 with this message.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Error finding archived version: {0}")]
    Resolution(#[from] SnapshotIndexError),

    #[error("Error parsing upstream URL '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },
}

pub struct RequestRouter {
    resolver: ArchiveUrlResolver,
    archive: ArchiveConfig,
    fixed_origin: FixedOriginConfig,
    snapshot_date: String,
}

impl RequestRouter {
    pub fn new(
        resolver: ArchiveUrlResolver,
        archive: ArchiveConfig,
        fixed_origin: FixedOriginConfig,
        snapshot_date: String,
    ) -> Self {
        Self {
            resolver,
            archive,
            fixed_origin,
            snapshot_date,
        }
    }

    /// Classify the inbound request by host and produce the upstream target
    /// together with the rewrite hook for its mode.
    pub async fn route(
        &self,
        host: &str,
        uri: &Uri,
    ) -> Result<(ResolvedTarget, RewriteHook), RouteError> {
        if self.is_fixed_origin_request(host) {
            let target = self.fixed_origin_target(uri)?;
            tracing::debug!(%host, path = uri.path(), %target, "handling fixed-origin request");
            return Ok((target, RewriteHook::ScreenshotStrip));
        }

        let original = reconstruct_absolute(host, uri);
        tracing::debug!(original = %original, "handling archive request");

        let capture_url = if original.starts_with(&self.archive.web_prefix) {
            self.rederive_capture(&original).await?
        } else {
            let destination = redirect::follow(&original);
            if destination != original {
                tracing::debug!(from = %original, to = %destination, "followed redirect parameter");
            }
            self.resolver
                .resolve(&destination, &self.snapshot_date)
                .await?
        };

        let url = Url::parse(&capture_url).map_err(|e| RouteError::InvalidTarget {
            url: capture_url.clone(),
            reason: e.to_string(),
        })?;
        let target = ResolvedTarget::checked(url, ProxyMode::Archive)?;
        Ok((target, RewriteHook::ToolbarStrip))
    }

    fn is_fixed_origin_request(&self, host: &str) -> bool {
        host.contains(&self.fixed_origin.host)
    }

    /// Fixed origin: scheme forced to HTTPS, inbound path and query copied
    /// verbatim, empty path normalized to `/`.
    fn fixed_origin_target(&self, uri: &Uri) -> Result<ResolvedTarget, RouteError> {
        let path = if uri.path().is_empty() { "/" } else { uri.path() };
        let mut raw = format!("https://{}{}", self.fixed_origin.host, path);
        if let Some(query) = uri.query() {
            raw.push('?');
            raw.push_str(query);
        }

        let url = Url::parse(&raw).map_err(|e| RouteError::InvalidTarget {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        ResolvedTarget::checked(url, ProxyMode::FixedOrigin)
    }

    /// The request already targets the archive. Recover the wrapped
    /// destination and check it for a bounce-through parameter; a second
    /// hop through a redirector embedded in an archived page needs a fresh
    /// resolution, everything else reuses the capture URL unchanged.
    async fn rederive_capture(&self, original: &str) -> Result<String, RouteError> {
        let parts: Vec<&str> = original.split('/').collect();
        if parts.len() < 7 {
            tracing::debug!(url = %original, "reusing existing capture URL");
            return Ok(original.to_string());
        }

        // Fixed-offset split: segments [6..] hold the wrapped destination
        // minus its scheme (the scheme and its empty slash segment occupy
        // [5..7)).
        let candidate = format!("http://{}", parts[6..].join("/"));
        match redirect::scan(&candidate) {
            RedirectTarget::Found(destination) if destination != candidate => {
                tracing::debug!(embedded = %candidate, %destination, "following redirect inside capture URL");
                Ok(self
                    .resolver
                    .resolve(&destination, &self.snapshot_date)
                    .await?)
            }
            _ => {
                tracing::debug!(url = %original, "reusing existing capture URL");
                Ok(original.to_string())
            }
        }
    }
}

/// Absolute form of the inbound request URL: proxy-form requests already
/// carry it, origin-form requests get the Host spliced back in.
fn reconstruct_absolute(host: &str, uri: &Uri) -> String {
    let raw = uri.to_string();
    if raw.starts_with("http") {
        raw
    } else {
        format!("http://{host}{raw}")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::ports::snapshot_index::{SnapshotIndex, SnapshotIndexResult};

    /// Answers every lookup with one fixed timestamp and records the
    /// destinations it was asked about.
    struct RecordingIndex {
        timestamp: &'static str,
        lookups: Mutex<Vec<(String, String)>>,
    }

    impl RecordingIndex {
        fn new(timestamp: &'static str) -> Arc<Self> {
            Arc::new(Self {
                timestamp,
                lookups: Mutex::new(Vec::new()),
            })
        }

        fn lookups(&self) -> Vec<(String, String)> {
            self.lookups.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SnapshotIndex for RecordingIndex {
        async fn earliest_capture(
            &self,
            destination: &str,
            from_date: &str,
        ) -> SnapshotIndexResult<String> {
            self.lookups
                .lock()
                .unwrap()
                .push((destination.to_string(), from_date.to_string()));
            Ok(self.timestamp.to_string())
        }
    }

    struct FailingIndex;

    #[async_trait]
    impl SnapshotIndex for FailingIndex {
        async fn earliest_capture(
            &self,
            destination: &str,
            _from_date: &str,
        ) -> SnapshotIndexResult<String> {
            Err(SnapshotIndexError::NoSnapshot(destination.to_string()))
        }
    }

    fn router_with(index: Arc<dyn SnapshotIndex>) -> RequestRouter {
        let archive = ArchiveConfig::default();
        RequestRouter::new(
            ArchiveUrlResolver::new(index, archive.clone()),
            archive,
            FixedOriginConfig::default(),
            "20020401".to_string(),
        )
    }

    #[tokio::test]
    async fn test_fixed_origin_host_forces_https_and_preserves_path_query() {
        let router = router_with(RecordingIndex::new("20020405123000"));

        let uri: Uri = "/neighborhood/page.html?area=5".parse().unwrap();
        let (target, hook) = router
            .route("geocities.restorativland.org", &uri)
            .await
            .unwrap();

        assert_eq!(target.mode, ProxyMode::FixedOrigin);
        assert_eq!(
            target.url.as_str(),
            "https://geocities.restorativland.org/neighborhood/page.html?area=5"
        );
        assert_eq!(hook, RewriteHook::ScreenshotStrip);
    }

    #[tokio::test]
    async fn test_fixed_origin_matches_host_with_port_and_normalizes_empty_path() {
        let router = router_with(RecordingIndex::new("20020405123000"));

        let uri: Uri = "/".parse().unwrap();
        let (target, _) = router
            .route("geocities.restorativland.org:8080", &uri)
            .await
            .unwrap();

        assert_eq!(
            target.url.as_str(),
            "https://geocities.restorativland.org/"
        );
    }

    #[tokio::test]
    async fn test_archive_mode_resolves_fresh_destination_with_configured_date() {
        let index = RecordingIndex::new("20020405123000");
        let router = router_with(index.clone());

        let uri: Uri = "http://example.com/".parse().unwrap();
        let (target, hook) = router.route("example.com", &uri).await.unwrap();

        assert_eq!(target.mode, ProxyMode::Archive);
        assert_eq!(
            target.url.as_str(),
            "http://web.archive.org/web/20020405123000/http://example.com/"
        );
        assert_eq!(hook, RewriteHook::ToolbarStrip);
        assert_eq!(
            index.lookups(),
            vec![("http://example.com/".to_string(), "20020401".to_string())]
        );
    }

    #[tokio::test]
    async fn test_origin_form_request_is_reconstructed_from_host() {
        let index = RecordingIndex::new("20020405123000");
        let router = router_with(index.clone());

        let uri: Uri = "/page.html".parse().unwrap();
        router.route("example.com", &uri).await.unwrap();

        assert_eq!(
            index.lookups(),
            vec![("http://example.com/page.html".to_string(), "20020401".to_string())]
        );
    }

    #[tokio::test]
    async fn test_redirect_parameter_is_followed_before_resolution() {
        let index = RecordingIndex::new("20020405123000");
        let router = router_with(index.clone());

        let uri: Uri = "http://tracker.example/out?redirect=https://other.example/page"
            .parse()
            .unwrap();
        router.route("tracker.example", &uri).await.unwrap();

        assert_eq!(
            index.lookups(),
            vec![("https://other.example/page".to_string(), "20020401".to_string())]
        );
    }

    #[tokio::test]
    async fn test_archive_url_with_embedded_redirect_is_reresolved() {
        let index = RecordingIndex::new("20020607080910");
        let router = router_with(index.clone());

        let uri: Uri =
            "http://web.archive.org/web/20020405123000/http://example.com/login?redirect=https://other.example/page"
                .parse()
                .unwrap();
        let (target, _) = router.route("web.archive.org", &uri).await.unwrap();

        assert_eq!(
            index.lookups(),
            vec![("https://other.example/page".to_string(), "20020401".to_string())]
        );
        assert_eq!(
            target.url.as_str(),
            "http://web.archive.org/web/20020607080910/https://other.example/page"
        );
    }

    #[tokio::test]
    async fn test_archive_url_without_redirect_is_reused_unchanged() {
        let index = RecordingIndex::new("20020405123000");
        let router = router_with(index.clone());

        let raw = "http://web.archive.org/web/20020405123000/http://example.com/page.html";
        let uri: Uri = raw.parse().unwrap();
        let (target, _) = router.route("web.archive.org", &uri).await.unwrap();

        assert!(index.lookups().is_empty());
        assert_eq!(target.url.as_str(), raw);
    }

    #[tokio::test]
    async fn test_resolution_failure_becomes_route_error() {
        let router = router_with(Arc::new(FailingIndex));

        let uri: Uri = "http://gone.example/".parse().unwrap();
        let err = router.route("gone.example", &uri).await.unwrap_err();

        assert!(matches!(err, RouteError::Resolution(_)));
        assert!(err.to_string().starts_with("Error finding archived version:"));
    }
}
