//! HTML response rewriting.
//!
//! Two independent transforms, both applied only when the response declares
//! `text/html`: stripping the archive's injected toolbar fragment plus its
//! tracking script, and replacing heavy screenshot blocks with a comment
//! placeholder. Bodies are buffered whole for rewriting; `transform_response`
//! enforces the configured size cap and recomputes Content-Length afterwards,
//! since the upstream value is stale once the body changed.
use std::borrow::Cow;

use axum::body::Body as AxumBody;
use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use hyper::{Response, header};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub const TOOLBAR_BEGIN: &str = "<!-- BEGIN WAYBACK TOOLBAR INSERT -->";
pub const TOOLBAR_END: &str = "<!-- END WAYBACK TOOLBAR INSERT -->";
pub const SCREENSHOT_PLACEHOLDER: &str = "<!-- Screenshot removed for performance -->";

const TRACKING_SCRIPT: &str =
    r#"<script src="//archive.org/includes/athena.js" type="text/javascript"></script>"#;

// Non-greedy so a nested same-named element inside the block does not drag
// the match past the first closing tag.
static CARD_IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<div\s+class="card-image">.*?</div>"#).expect("invalid card-image pattern")
});

/// Which rewrite applies to a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteHook {
    /// Strip the archive toolbar fragment and tracking script (archive mode).
    ToolbarStrip,
    /// Replace screenshot blocks with a placeholder (fixed-origin mode).
    ScreenshotStrip,
}

impl RewriteHook {
    pub fn apply(self, html: &str) -> Cow<'_, str> {
        match self {
            Self::ToolbarStrip => strip_archive_chrome(html),
            Self::ScreenshotStrip => strip_screenshots(html),
        }
    }
}

/// Error while buffering a response body for rewriting.
#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("failed to read upstream body: {0}")]
    BodyRead(String),
}

/// Delete the inclusive span between the first begin marker and the first
/// end marker, provided both exist and in that order, then remove every
/// occurrence of the tracking script tag.
pub fn strip_archive_chrome(html: &str) -> Cow<'_, str> {
    let mut out = Cow::Borrowed(html);

    if let (Some(begin), Some(end)) = (html.find(TOOLBAR_BEGIN), html.find(TOOLBAR_END)) {
        if begin < end {
            let span_end = end + TOOLBAR_END.len();
            let mut stripped = String::with_capacity(html.len() - (span_end - begin));
            stripped.push_str(&html[..begin]);
            stripped.push_str(&html[span_end..]);
            out = Cow::Owned(stripped);
        }
    }

    if out.contains(TRACKING_SCRIPT) {
        out = Cow::Owned(out.replace(TRACKING_SCRIPT, ""));
    }

    out
}

/// Replace every screenshot block with the placeholder comment. A block
/// whose opening tag never closes simply does not match and stays as-is.
pub fn strip_screenshots(html: &str) -> Cow<'_, str> {
    CARD_IMAGE_RE.replace_all(html, SCREENSHOT_PLACEHOLDER)
}

/// Run the rewrite hook over an upstream response.
///
/// Non-HTML responses pass through untouched. HTML responses whose declared
/// length exceeds `max_body_bytes` also pass through (streamed, unrewritten)
/// rather than being buffered; a body that overruns the cap while being
/// collected is an error the caller treats as a failed attempt.
pub async fn transform_response(
    response: Response<AxumBody>,
    hook: RewriteHook,
    max_body_bytes: usize,
) -> Result<Response<AxumBody>, RewriteError> {
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("text/html"));
    if !is_html {
        return Ok(response);
    }

    let declared_len = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if let Some(len) = declared_len {
        if len > max_body_bytes {
            tracing::warn!(
                declared = len,
                limit = max_body_bytes,
                "HTML body exceeds rewrite buffer limit; passing through unmodified"
            );
            return Ok(response);
        }
    }

    let (mut parts, body) = response.into_parts();
    let collected = Limited::new(body, max_body_bytes)
        .collect()
        .await
        .map_err(|e| RewriteError::BodyRead(e.to_string()))?;
    let bytes = collected.to_bytes();

    let rewritten = match std::str::from_utf8(&bytes) {
        Ok(html) => match hook.apply(html) {
            Cow::Borrowed(_) => bytes.clone(),
            Cow::Owned(stripped) => Bytes::from(stripped),
        },
        Err(_) => {
            tracing::debug!("declared HTML body is not valid UTF-8; leaving unmodified");
            bytes.clone()
        }
    };

    parts
        .headers
        .insert(header::CONTENT_LENGTH, header::HeaderValue::from(rewritten.len()));

    Ok(Response::from_parts(parts, AxumBody::from(rewritten)))
}
