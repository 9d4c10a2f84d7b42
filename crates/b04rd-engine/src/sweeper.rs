//! Background sweeper: archives quiet threads and purges expired sessions
//! on a fixed interval until shutdown.

use std::{sync::Arc, time::Duration};

use b04rd_core::{
  remote::{AvatarSource, BlobStore},
  store::{CommentStore, SessionStore, ThreadStore},
};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{Board, threads::SweepReport};

/// Default time between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Run one sweep of threads and sessions. Failures are logged, never
/// propagated.
pub async fn sweep_once<S, A, B>(
  board: &Board<S, A, B>,
  cancel: &CancellationToken,
) -> Option<SweepReport>
where
  S: SessionStore + ThreadStore + CommentStore,
  A: AvatarSource,
  B: BlobStore + 'static,
{
  let report = match board.threads.cleanup_expired(cancel).await {
    Ok(report) => Some(report),
    Err(err) => {
      tracing::error!(%err, "thread sweep finished with errors");
      None
    }
  };

  if let Err(err) = board.identity.purge_expired(cancel).await {
    tracing::error!(%err, "failed to purge expired sessions");
  }

  report
}

/// Sweep every `every` until `shutdown` fires. The first sweep happens one
/// interval after start.
pub async fn run<S, A, B>(
  board: Arc<Board<S, A, B>>,
  every: Duration,
  shutdown: CancellationToken,
) where
  S: SessionStore + ThreadStore + CommentStore,
  A: AvatarSource,
  B: BlobStore + 'static,
{
  let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
  tracing::info!(interval = ?every, "sweeper started");

  loop {
    tokio::select! {
      _ = shutdown.cancelled() => {
        tracing::info!("sweeper stopped");
        break;
      }
      _ = ticker.tick() => {
        sweep_once(&board, &shutdown).await;
      }
    }
  }
}
