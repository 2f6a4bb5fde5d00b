use eyre::Result;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize console logging for the proxy.
///
/// `debug` widens the crate's default filter to `debug`, which makes header
/// dumps and intermediate URL transformations visible. An explicit
/// `RUST_LOG` always wins over the flag.
pub fn init_tracing(debug: bool) -> Result<()> {
    let default_filter = if debug { "timegate=debug,info" } else { "info" };

    Registry::default()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("timegate logging initialized");
    Ok(())
}

/// Create a request-scoped tracing span
pub fn create_request_span(method: &str, uri: &str) -> tracing::Span {
    tracing::info_span!(
        "request",
        http.method = method,
        http.uri = uri,
        http.status_code = tracing::field::Empty,
    )
}
