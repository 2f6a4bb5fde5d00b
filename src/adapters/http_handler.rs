use std::sync::Arc;

use axum::body::Body as AxumBody;
use http::request::Parts;
use http_body_util::{BodyExt, Limited};
use hyper::{Request, Response, StatusCode, header};
use tracing::Instrument;

use crate::{
    core::{RequestRouter, RetryingForwarder, forwarder::synthetic_response},
    tracing_setup,
};

/// HTTP handler for the timegate proxy.
///
/// One instance serves every inbound request: the router decides the mode
/// and upstream target, the forwarder drives the retrying upstream call.
/// The handler itself never fails; every error path degrades to a synthetic
/// response for the client.
pub struct HttpHandler {
    router: Arc<RequestRouter>,
    forwarder: Arc<RetryingForwarder>,
    max_body_bytes: usize,
}

impl HttpHandler {
    pub fn new(
        router: Arc<RequestRouter>,
        forwarder: Arc<RetryingForwarder>,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            router,
            forwarder,
            max_body_bytes,
        }
    }

    /// Main request handler.
    pub async fn handle_request(&self, req: Request<AxumBody>) -> Response<AxumBody> {
        let span =
            tracing_setup::create_request_span(req.method().as_str(), &req.uri().to_string());
        let response = self.dispatch(req).instrument(span.clone()).await;
        span.record("http.status_code", response.status().as_u16());
        response
    }

    async fn dispatch(&self, req: Request<AxumBody>) -> Response<AxumBody> {
        let (parts, body) = req.into_parts();
        let host = request_host(&parts);

        tracing::info!(method = %parts.method, uri = %parts.uri, %host, "handling request");

        // Buffered once so the forwarder can replay it on every attempt.
        let body = match Limited::new(body, self.max_body_bytes).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::error!(error = %e, "failed to buffer inbound request body");
                return synthetic_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "Request body too large".to_string(),
                );
            }
        };

        let (target, hook) = match self.router.route(&host, &parts.uri).await {
            Ok(routed) => routed,
            Err(e) => {
                tracing::error!(error = %e, uri = %parts.uri, "failed to resolve upstream target");
                return synthetic_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
            }
        };

        self.forwarder.forward(&parts, &body, &target, hook).await
    }
}

impl Clone for HttpHandler {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            forwarder: self.forwarder.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

/// Host used for mode classification: the request-line authority when the
/// request is proxy-form, the Host header otherwise.
fn request_host(parts: &Parts) -> String {
    if let Some(authority) = parts.uri.authority() {
        return authority.to_string();
    }

    parts
        .headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string()
}
