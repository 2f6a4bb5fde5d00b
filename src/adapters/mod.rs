pub mod cdx;
pub mod http_handler;
pub mod upstream_client;

/// Re-export commonly used types from adapters
pub use cdx::CdxClient;
pub use http_handler::HttpHandler;
pub use upstream_client::UpstreamClientAdapter;
