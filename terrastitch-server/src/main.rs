//! Terrastitch server - composited terrain tile HTTP service
//!
//! Selects a fetch backend from the command line, wires it into the tile
//! service, and serves the tile routes with readiness-based graceful
//! shutdown.

mod routes;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use routes::AppState;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use terrastitch::fetch::{HttpTileFetcher, S3TileFetcher, TileFetcher};
use terrastitch::logging::init_logging;
use terrastitch::service::TileService;
use terrastitch::tile::TileVersion;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Time to keep answering /ready with a failure before shutting the
/// server down, so load balancers drain this instance first.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(20);

/// Time to wait for in-flight requests after shutdown begins.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, ValueEnum)]
enum FetchMethod {
    /// Plain HTTP GET against a tile server prefix
    Http,
    /// GET against an S3 bucket over its HTTP interface
    S3,
}

#[derive(Parser)]
#[command(name = "terrastitch-server")]
#[command(about = "Serve composited terrain tiles", version)]
struct Args {
    /// The port to listen on
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Method to use when fetching source tiles
    #[arg(long, value_enum)]
    fetch_method: FetchMethod,

    /// URL prefix when fetching tiles with the http fetch method
    #[arg(long, required_if_eq("fetch_method", "http"))]
    http_prefix: Option<String>,

    /// S3 bucket to fetch tiles from when using the s3 fetch method
    #[arg(long, required_if_eq("fetch_method", "s3"))]
    s3_bucket: Option<String>,

    /// Region of the S3 bucket
    #[arg(long, required_if_eq("fetch_method", "s3"))]
    s3_region: Option<String>,

    /// Send the requester-pays header with S3 requests
    #[arg(long, default_value_t = false)]
    requester_pays: bool,

    /// Directory for log files (stdout only when omitted)
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _logging_guard = init_logging(args.log_dir.as_deref())?;

    let fetcher: Arc<dyn TileFetcher> = match args.fetch_method {
        FetchMethod::Http => {
            let prefix = args
                .http_prefix
                .context("--http-prefix must be set when using the http fetch method")?;
            info!(prefix = %prefix, "fetching tiles over HTTP");
            Arc::new(HttpTileFetcher::new(prefix)?)
        }
        FetchMethod::S3 => {
            let bucket = args
                .s3_bucket
                .context("--s3-bucket must be set when using the s3 fetch method")?;
            let region = args
                .s3_region
                .context("--s3-region must be set when using the s3 fetch method")?;
            info!(
                bucket = %bucket,
                region = %region,
                requester_pays = args.requester_pays,
                "fetching tiles from S3"
            );
            Arc::new(S3TileFetcher::new(bucket, region, args.requester_pays)?)
        }
    };

    let ready = Arc::new(AtomicBool::new(true));
    let shutdown = CancellationToken::new();

    let state = AppState {
        service: Arc::new(TileService::new(fetcher)),
        ready: ready.clone(),
        shutdown: shutdown.clone(),
        health_version: TileVersion::parse("v1")?,
    };
    let app = routes::router(state);

    // SIGTERM starts the drain: fail readiness, wait for the load balancer
    // to stop sending traffic, then stop accepting connections.
    tokio::spawn({
        let ready = ready.clone();
        let shutdown = shutdown.clone();
        async move {
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(stream) => stream,
                Err(error) => {
                    warn!(error = %error, "couldn't install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = sigterm.recv() => {}
                result = tokio::signal::ctrl_c() => {
                    if let Err(error) = result {
                        warn!(error = %error, "couldn't wait for ctrl-c");
                        return;
                    }
                }
            }

            info!("shutdown signal received, starting graceful shutdown");
            ready.store(false, Ordering::SeqCst);
            tokio::time::sleep(SHUTDOWN_DRAIN).await;
            shutdown.cancel();
        }
    });

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("couldn't bind {}", addr))?;
    info!(addr = %addr, version = terrastitch::VERSION, "service started");

    let server = axum::serve(listener, app).with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move { shutdown.cancelled().await }
    });

    tokio::select! {
        result = server.into_future() => result.context("server error")?,
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => {
            warn!("graceful shutdown timed out, exiting with requests in flight");
        }
    }

    info!("server stopped");
    Ok(())
}
