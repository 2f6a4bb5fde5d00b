use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use axum::{Router, body::Body, extract::Request, response::Response, routing::any};
use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use timegate::{
    adapters::{CdxClient, HttpHandler, UpstreamClientAdapter},
    config::{LimitsConfig, ProxyConfig, ProxyConfigValidator, RetryConfig},
    core::{ArchiveUrlResolver, RequestRouter, RetryingForwarder},
    ports::{snapshot_index::SnapshotIndex, upstream_client::UpstreamClient},
    tracing_setup,
    utils::GracefulShutdown,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Port to listen on
    #[clap(short, long, default_value_t = 8080)]
    port: u16,

    /// Date in YYYYMMDD format
    #[clap(short, long)]
    date: String,

    /// Enable debug logging
    #[clap(long)]
    debug: bool,

    /// Maximum number of forwarding attempts for failed requests
    #[clap(long, default_value_t = 3)]
    max_retries: u32,

    /// Initial delay between retries (doubles after each failed attempt)
    #[clap(long, default_value = "1s", value_parser = humantime::parse_duration)]
    retry_delay: Duration,

    /// Largest response body buffered for HTML rewriting, in bytes
    #[clap(long, default_value_t = 8 * 1024 * 1024)]
    max_body_bytes: usize,
}

impl Args {
    fn into_config(self) -> ProxyConfig {
        let Args {
            port,
            date,
            debug: _,
            max_retries,
            retry_delay,
            max_body_bytes,
        } = self;

        ProxyConfig {
            listen_addr: format!("0.0.0.0:{port}"),
            snapshot_date: date,
            retry: RetryConfig {
                max_attempts: max_retries,
                initial_delay: retry_delay,
            },
            limits: LimitsConfig { max_body_bytes },
            ..ProxyConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let debug = args.debug;
    let config = args.into_config();

    tracing_setup::init_tracing(debug).map_err(|e| eyre!("Failed to initialize tracing: {e}"))?;

    // An invalid date (or any other bad flag value) aborts startup here
    ProxyConfigValidator::validate(&config).map_err(|e| eyre!("Invalid configuration: {e}"))?;

    if debug {
        match serde_json::to_string(&config) {
            Ok(dump) => tracing::debug!(config = %dump, "resolved configuration"),
            Err(e) => tracing::warn!("Failed to serialize configuration for debug dump: {e}"),
        }
    }

    let provider = rustls::crypto::aws_lc_rs::default_provider();
    if let Err(e) = rustls::crypto::CryptoProvider::install_default(provider) {
        tracing::warn!(
            "CryptoProvider::install_default for aws-lc-rs reported an error: {:?}. \
            This can happen if a provider was already installed. \
            The application will proceed; ensure a crypto provider is effectively available.",
            e
        );
    }

    let index: Arc<dyn SnapshotIndex> = Arc::new(
        CdxClient::new(config.archive.cdx_endpoint.clone())
            .context("Failed to create CDX client")?,
    );
    let resolver = ArchiveUrlResolver::new(index, config.archive.clone());
    let router = Arc::new(RequestRouter::new(
        resolver,
        config.archive.clone(),
        config.fixed_origin.clone(),
        config.snapshot_date.clone(),
    ));

    let upstream: Arc<dyn UpstreamClient> = Arc::new(
        UpstreamClientAdapter::new().context("Failed to create upstream client adapter")?,
    );
    let forwarder = Arc::new(RetryingForwarder::new(
        upstream,
        config.retry.clone(),
        config.limits.max_body_bytes,
    ));

    let handler = Arc::new(HttpHandler::new(
        router,
        forwarder,
        config.limits.max_body_bytes,
    ));

    // Create graceful shutdown manager
    let graceful_shutdown = Arc::new(GracefulShutdown::new());
    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal_handler_shutdown.run_signal_handler().await {
            tracing::error!("Signal handler error: {}", e);
        }
    });

    let make_request_route = |handler: Arc<HttpHandler>| {
        any(move |req: Request| {
            let handler = handler.clone();
            async move {
                Ok::<Response<Body>, Infallible>(handler.handle_request(req).await)
            }
        })
    };

    let app = Router::new()
        .route("/{*path}", make_request_route(handler.clone()))
        .route("/", make_request_route(handler.clone()));

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .context("Failed to parse listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    tracing::info!(
        "Starting timegate proxy on {} for date {} (max retries: {}, initial delay: {:?})",
        config.listen_addr,
        config.snapshot_date,
        config.retry.max_attempts,
        config.retry.initial_delay
    );

    tokio::select! {
        result = axum::serve(listener, app) => {
            result.context("Server error")?;
        }
        shutdown_reason = graceful_shutdown.wait_for_shutdown_signal() => {
            tracing::info!("Shutdown signal received: {:?}", shutdown_reason);
            tracing::info!("Graceful shutdown completed");
        }
    }

    Ok(())
}
