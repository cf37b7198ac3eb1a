//! matchbook-ingest - Main entry point
//!
//! Passive capture daemon: receives exchanges forwarded by the intercepting
//! proxy, classifies them into domain events, and persists people, photos
//! and image assets through a pool of workers.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use matchbook_common::config::{resolve_root_folder, Paths};
use matchbook_common::db::{init_database, AssetFetcher, Repository};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matchbook_ingest::api::{self, AppState};
use matchbook_ingest::classify::{
    ClassifierMiddleware, DislikeClassifier, LikeClassifier, MatchClassifier,
    RecommendationClassifier,
};
use matchbook_ingest::fetch::PhotoFetcher;
use matchbook_ingest::pipeline::{handlers::default_handlers, WorkQueue, WorkerPool};

/// Command-line arguments for matchbook-ingest
#[derive(Parser, Debug)]
#[command(name = "matchbook-ingest")]
#[command(about = "Passive capture daemon for dating-app traffic")]
#[command(version)]
struct Args {
    /// Port to listen on for forwarded exchanges
    #[arg(short, long, default_value = "5730", env = "MATCHBOOK_PORT")]
    port: u16,

    /// Data root folder (database and image tree)
    #[arg(short, long, env = "MATCHBOOK_ROOT")]
    root_folder: Option<PathBuf>,

    /// Number of pipeline workers
    #[arg(short, long, default_value = "4", env = "MATCHBOOK_WORKERS")]
    workers: usize,

    /// Only process exchanges whose host contains this string
    #[arg(long, default_value = "tinder", env = "MATCHBOOK_HOST_FILTER")]
    host_filter: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "matchbook_ingest=debug,matchbook_common=debug,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting matchbook-ingest on port {}", args.port);

    let root = resolve_root_folder(args.root_folder.as_deref());
    let paths = Paths::new(root);
    paths
        .ensure_directories()
        .context("Failed to initialize data root folder")?;
    info!("Data root: {}", paths.root().display());

    let pool = init_database(&paths.database_path())
        .await
        .context("Failed to initialize database")?;
    let repo = Repository::new(pool);

    // Fetches interrupted by a crash become eligible again before any
    // worker starts
    let reset = repo.reset_stale_downloads().await?;
    if reset > 0 {
        info!("Reset {} photos stranded in downloading state", reset);
    }

    let (queue, queue_rx) = WorkQueue::new();

    let fetcher: Arc<dyn AssetFetcher> =
        Arc::new(PhotoFetcher::new(repo.clone(), paths.images_dir())?);
    let worker_pool = WorkerPool::start(
        default_handlers(repo.clone(), fetcher),
        queue_rx,
        args.workers,
    );

    let middleware = Arc::new(
        ClassifierMiddleware::new(vec![
            Box::new(RecommendationClassifier::new(queue.clone())),
            Box::new(MatchClassifier::new(queue.clone())),
            Box::new(LikeClassifier::new(queue.clone())),
            Box::new(DislikeClassifier::new(queue)),
        ])
        .with_host_filter(args.host_filter),
    );

    let state = AppState {
        middleware,
        repo,
        image_root: paths.images_dir(),
        started_at: chrono::Utc::now(),
    };
    let app = api::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // In-flight handler calls drain to completion; queued items beyond
    // that are dropped (capture is best-effort)
    worker_pool.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
