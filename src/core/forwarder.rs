//! Retrying upstream forwarder.
//!
//! Performs up to `max_attempts` forwarding calls against a resolved target,
//! classifies each outcome, and applies exponential backoff between
//! retryable failures. The forwarder always produces a response for the
//! client: terminal upstream failures are forwarded verbatim, exhausted
//! retries become a synthetic 502, and nothing an attempt does is allowed to
//! unwind past the retry loop.
use std::{panic::AssertUnwindSafe, sync::Arc};

use axum::body::Body as AxumBody;
use bytes::Bytes;
use futures_util::FutureExt;
use http::request::Parts;
use hyper::{Request, Response, StatusCode, header};

use crate::{
    config::RetryConfig,
    core::{
        rewrite::{self, RewriteHook},
        router::ResolvedTarget,
    },
    ports::upstream_client::UpstreamClient,
};

/// Tagged outcome of one forwarding attempt. The retry loop matches on the
/// tag; there is no exception-like control flow between an attempt and the
/// loop driving it.
enum AttemptOutcome {
    /// Status in [200, 400): returned to the client immediately.
    Success(Response<AxumBody>),
    /// Gateway-class failure: 502, a transport error, or a caught panic.
    Retryable { detail: String },
    /// Any other status: forwarded to the client verbatim, no retry.
    Terminal(Response<AxumBody>),
}

pub struct RetryingForwarder {
    client: Arc<dyn UpstreamClient>,
    retry: RetryConfig,
    max_body_bytes: usize,
}

impl RetryingForwarder {
    pub fn new(client: Arc<dyn UpstreamClient>, retry: RetryConfig, max_body_bytes: usize) -> Self {
        Self {
            client,
            retry,
            max_body_bytes,
        }
    }

    /// Forward the buffered inbound request to `target`, retrying
    /// gateway-class failures with exponential backoff.
    ///
    /// The inbound body arrives pre-buffered so it can be replayed on every
    /// attempt. Backoff state is local to this invocation: each call starts
    /// from the configured initial delay and runs its own doubling sequence,
    /// so concurrent requests never interfere with each other.
    pub async fn forward(
        &self,
        parts: &Parts,
        body: &Bytes,
        target: &ResolvedTarget,
        hook: RewriteHook,
    ) -> Response<AxumBody> {
        let mut delay = self.retry.initial_delay;
        let mut last_error: Option<String> = None;

        for attempt in 1..=self.retry.max_attempts {
            if attempt > 1 {
                tracing::debug!(
                    attempt,
                    max = self.retry.max_attempts,
                    ?delay,
                    %target,
                    "retrying forward after backoff"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }

            match self.attempt(parts, body, target, hook).await {
                AttemptOutcome::Success(response) => {
                    tracing::debug!(attempt, status = %response.status(), %target, "forward succeeded");
                    if let Some(location) = response.headers().get(header::LOCATION) {
                        tracing::debug!(location = ?location, "redirect location");
                    }
                    return response;
                }
                AttemptOutcome::Terminal(response) => {
                    tracing::error!(
                        attempt,
                        status = %response.status(),
                        %target,
                        "forward attempt failed with non-retryable status"
                    );
                    tracing::debug!(headers = ?response.headers(), "upstream response headers");
                    return response;
                }
                AttemptOutcome::Retryable { detail } => {
                    tracing::warn!(
                        attempt,
                        max = self.retry.max_attempts,
                        %target,
                        %detail,
                        "forward attempt failed, connection-related, will retry"
                    );
                    last_error = Some(detail);
                }
            }
        }

        match last_error {
            Some(detail) => {
                tracing::error!(
                    attempts = self.retry.max_attempts,
                    %target,
                    %detail,
                    "forward failed after all attempts"
                );
                synthetic_response(
                    StatusCode::BAD_GATEWAY,
                    format!(
                        "Failed to connect to {} after {} attempts",
                        target, self.retry.max_attempts
                    ),
                )
            }
            // A zero-attempt policy means the loop never ran and nothing was
            // captured; there is no upstream outcome to report.
            None => synthetic_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error proxying request: no forwarding attempts were made".to_string(),
            ),
        }
    }

    /// One attempt, with crash-class faults converted into a retryable
    /// outcome so a failing attempt can never abort the whole request.
    async fn attempt(
        &self,
        parts: &Parts,
        body: &Bytes,
        target: &ResolvedTarget,
        hook: RewriteHook,
    ) -> AttemptOutcome {
        match AssertUnwindSafe(self.execute_once(parts, body, target, hook))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => AttemptOutcome::Retryable {
                detail: format!("proxy panic: {}", panic_message(panic.as_ref())),
            },
        }
    }

    async fn execute_once(
        &self,
        parts: &Parts,
        body: &Bytes,
        target: &ResolvedTarget,
        hook: RewriteHook,
    ) -> AttemptOutcome {
        let request = match build_upstream_request(parts, body.clone(), target) {
            Ok(request) => request,
            Err(detail) => return AttemptOutcome::Retryable { detail },
        };

        let response = match self.client.send_request(request).await {
            Ok(response) => response,
            Err(e) => {
                return AttemptOutcome::Retryable {
                    detail: e.to_string(),
                };
            }
        };

        // The rewrite hook runs against every upstream response, ahead of
        // classification, like a reverse-proxy response hook.
        let response = match rewrite::transform_response(response, hook, self.max_body_bytes).await
        {
            Ok(response) => response,
            Err(e) => {
                return AttemptOutcome::Retryable {
                    detail: format!("response rewrite failed: {e}"),
                };
            }
        };

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            AttemptOutcome::Success(response)
        } else if status == StatusCode::BAD_GATEWAY {
            AttemptOutcome::Retryable {
                detail: format!("upstream returned status {}", status.as_u16()),
            }
        } else {
            AttemptOutcome::Terminal(response)
        }
    }
}

/// Rebuild the inbound request against the upstream target. Hop headers the
/// proxy owns are dropped; the adapter re-derives Host from the URI.
fn build_upstream_request(
    parts: &Parts,
    body: Bytes,
    target: &ResolvedTarget,
) -> Result<Request<AxumBody>, String> {
    let uri: hyper::Uri = target
        .url
        .as_str()
        .parse()
        .map_err(|e| format!("invalid upstream URI {}: {e}", target.url))?;

    let mut builder = Request::builder().method(parts.method.clone()).uri(uri);
    for (name, value) in parts.headers.iter() {
        if name == header::HOST || name == header::PROXY_AUTHORIZATION || name == "proxy-connection"
        {
            continue;
        }
        builder = builder.header(name, value);
    }

    builder
        .body(AxumBody::from(body))
        .map_err(|e| format!("failed to build upstream request: {e}"))
}

pub(crate) fn synthetic_response(status: StatusCode, message: String) -> Response<AxumBody> {
    let mut response = Response::new(AxumBody::from(message));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
