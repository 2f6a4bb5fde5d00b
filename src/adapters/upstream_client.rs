use async_trait::async_trait;
use axum::body::Body as AxumBody;
use eyre::Result;
use hyper::{Request, Response, Version, header, header::HeaderValue};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls_native_certs::load_native_certs;

use crate::ports::upstream_client::{UpstreamClient, UpstreamError, UpstreamResult};

/// Upstream forwarding adapter using Hyper with Rustls (HTTP + HTTPS).
///
/// Responsibilities:
/// * Re-derives the Host header from the target URI
/// * Forces request version to HTTP/1.1
/// * Converts between Hyper body and Axum body types
///
/// One call is one forwarding attempt. Retries, backoff and outcome
/// classification are layered on top by the forwarder; this adapter stays
/// deliberately minimal.
pub struct UpstreamClientAdapter {
    client: Client<HttpsConnector<HttpConnector>, AxumBody>,
}

impl UpstreamClientAdapter {
    /// Create a new upstream client adapter.
    pub fn new() -> Result<Self> {
        // Install default crypto provider for rustls if not already set
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false); // Allow HTTPS URLs

        let mut root_cert_store = rustls::RootCertStore::empty();
        let native_certs = load_native_certs();

        if !native_certs.certs.is_empty() {
            for cert in native_certs.certs {
                if root_cert_store.add(cert).is_err() {
                    tracing::warn!("Failed to add native certificate to rustls RootCertStore");
                }
            }
            tracing::info!("Loaded {} native root certificates.", root_cert_store.len());
        }

        if !native_certs.errors.is_empty() {
            tracing::warn!(
                "Some native certificates failed to load: {:?}",
                native_certs.errors
            );
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new()).build::<_, AxumBody>(https_connector);

        tracing::info!("Created upstream HTTP client (HTTP and HTTPS via rustls)");
        Ok(Self { client })
    }
}

/// Host header value for an outgoing URI, including any explicit port.
fn host_header_for(uri: &hyper::Uri) -> Option<HeaderValue> {
    let host = uri.host()?;
    let value = match uri.port() {
        Some(port) => HeaderValue::from_str(&format!("{host}:{}", port.as_u16())),
        None => HeaderValue::from_str(host),
    };
    value.ok()
}

#[async_trait]
impl UpstreamClient for UpstreamClientAdapter {
    async fn send_request(
        &self,
        mut req: Request<AxumBody>,
    ) -> UpstreamResult<Response<AxumBody>> {
        let client = self.client.clone();

        let upstream_identifier = format!(
            "{}://{}",
            req.uri().scheme_str().unwrap_or("http"),
            req.uri()
                .authority()
                .map_or_else(|| "unknown".to_string(), |a| a.to_string())
        );
        let request_method = req.method().to_string();

        let span = tracing::info_span!(
            "upstream_request",
            upstream.url = %upstream_identifier,
            http.method = %request_method,
            http.status_code = tracing::field::Empty,
        );
        let _enter = span.enter();

        match host_header_for(req.uri()) {
            Some(host_value) => {
                req.headers_mut().insert(header::HOST, host_value);
            }
            None => {
                tracing::error!("Outgoing URI has no host: {}", req.uri());
                return Err(UpstreamError::InvalidRequest(
                    "Outgoing URI has no host".to_string(),
                ));
            }
        }

        let (mut parts, body) = req.into_parts();
        parts.version = Version::HTTP_11;

        tracing::debug!(
            "Sending upstream request: {} {}",
            parts.method,
            parts.uri
        );
        tracing::debug!("Outgoing request headers: {:?}", parts.headers);

        let outgoing_request = Request::from_parts(parts, body);

        let method_for_error_log = outgoing_request.method().clone();
        let uri_for_error_log = outgoing_request.uri().clone();

        match client.request(outgoing_request).await {
            Ok(response) => {
                let status_code = response.status().as_u16();
                tracing::Span::current().record("http.status_code", status_code);

                let (mut parts, hyper_body) = response.into_parts();

                // The body arrives decoded/streamed; downstream framing is
                // handled by Axum, so upstream Transfer-Encoding must go.
                parts.headers.remove(header::TRANSFER_ENCODING);

                Ok(Response::from_parts(parts, AxumBody::new(hyper_body)))
            }
            Err(e) => {
                tracing::Span::current().record("http.status_code", 599u16);

                tracing::error!(
                    "Error forwarding to {} ({} {}): {}",
                    upstream_identifier,
                    method_for_error_log,
                    uri_for_error_log,
                    e
                );

                Err(UpstreamError::ConnectionError(format!(
                    "Request to {method_for_error_log} {uri_for_error_log} failed: {e}"
                )))
            }
        }
    }
}
