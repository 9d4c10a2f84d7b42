//! b04rd server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `B04RD_*`
//! environment overrides, opens the SQLite store, and serves the board over
//! HTTP with the archive sweeper running alongside.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use b04rd_api::AppState;
use b04rd_core::clock::SystemClock;
use b04rd_engine::{Board, sweeper};
use b04rd_server::{HttpAvatarSource, HttpBlobStore, LiveBackend, ServerConfig};
use b04rd_store_sqlite::SqliteStore;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// How long background tasks get to wind down after the server stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(author, version, about = "b04rd anonymous imageboard server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config).context("failed to read configuration")?;
  let board_config = cfg.board_config().context("invalid configuration")?;

  let store = SqliteStore::open(&cfg.database_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.database_path))?;

  let avatars =
    HttpAvatarSource::new(&cfg.avatar_base_url).context("failed to build avatar client")?;

  let mut buckets = Vec::with_capacity(2);
  for bucket in [&cfg.blob_bucket_threads, &cfg.blob_bucket_comments] {
    let blobs =
      HttpBlobStore::new(&cfg.blob_endpoint, cfg.blob_use_ssl, bucket, cfg.blob_credentials())
        .context("failed to build blob store client")?;
    blobs
      .check_bucket()
      .await
      .with_context(|| format!("blob store check failed for bucket {bucket:?}"))?;
    buckets.push(Arc::new(blobs));
  }
  let comment_blobs = buckets.pop().context("comment bucket missing")?;
  let thread_blobs = buckets.pop().context("thread bucket missing")?;

  let board = Arc::new(Board::new(
    Arc::new(store),
    Arc::new(avatars),
    thread_blobs,
    comment_blobs,
    Arc::new(SystemClock),
    board_config,
  ));

  // Background sweep of expired threads and sessions.
  let shutdown = CancellationToken::new();
  let sweep_handle = tokio::spawn(sweeper::run(
    Arc::clone(&board),
    cfg.sweep_interval(),
    shutdown.clone(),
  ));

  let state = AppState::<LiveBackend>::new(board, cfg.api_config());
  let app = b04rd_api::router(state).layer(TraceLayer::new_for_http());

  let address = cfg.address();
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await
    .context("server error")?;

  shutdown.cancel();
  if tokio::time::timeout(SHUTDOWN_GRACE, sweep_handle).await.is_err() {
    tracing::warn!("sweeper did not stop within {SHUTDOWN_GRACE:?}");
  }

  tracing::info!("Shutdown complete");
  Ok(())
}

/// Resolves on Ctrl-C, SIGTERM, or when `shutdown` is cancelled.
async fn shutdown_signal(shutdown: CancellationToken) {
  let ctrl_c = async {
    if let Err(err) = tokio::signal::ctrl_c().await {
      tracing::error!(%err, "failed to listen for ctrl-c");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(err) => {
        tracing::error!(%err, "failed to install SIGTERM handler");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
    _ = shutdown.cancelled() => {},
  }

  tracing::info!("Shutdown signal received, draining connections");
}
