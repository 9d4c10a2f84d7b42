//! Request-scoped cancellation.
//!
//! Every engine operation takes a [`CancellationToken`]. The HTTP layer
//! cancels it when the request future is dropped; the sweeper cancels it on
//! shutdown.

use std::future::Future;

use b04rd_core::{Error, Result};
use tokio_util::sync::CancellationToken;

/// Fail with [`Error::Cancelled`] if the token has already fired.
pub fn ensure_live(cancel: &CancellationToken) -> Result<()> {
  if cancel.is_cancelled() {
    return Err(Error::Cancelled);
  }
  Ok(())
}

/// Run `fut` unless `cancel` fires first.
///
/// Checks the token before polling, so an already-cancelled operation never
/// starts its next step.
pub async fn interruptible<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
  F: Future<Output = Result<T>>,
{
  ensure_live(cancel)?;
  tokio::select! {
    biased;
    _ = cancel.cancelled() => Err(Error::Cancelled),
    out = fut => out,
  }
}
