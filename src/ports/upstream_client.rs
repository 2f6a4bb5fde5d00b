use async_trait::async_trait;
use axum::body::Body as AxumBody;
use hyper::{Request, Response};
use thiserror::Error;

/// Custom error type for upstream forwarding calls
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum UpstreamError {
    /// Error when the connection to the upstream host fails
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error when the outgoing request cannot be constructed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for upstream client operations
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// UpstreamClient defines the port (interface) for a single forwarding call
/// to an upstream host. One call maps to one forward attempt; the retry
/// policy lives in the forwarder, never here.
#[async_trait]
pub trait UpstreamClient: Send + Sync + 'static {
    /// Send an HTTP request to the upstream host
    ///
    /// # Arguments
    /// * `req` - The fully-addressed HTTP request to send upstream
    ///
    /// # Returns
    /// A future that resolves to the upstream response or an error
    async fn send_request(&self, req: Request<AxumBody>) -> UpstreamResult<Response<AxumBody>>;
}
