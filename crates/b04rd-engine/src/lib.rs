//! Services behind the b04rd HTTP surface.
//!
//! Each service is generic over the store and remote traits from
//! `b04rd-core` and reads time through a [`Clock`]. [`Board`] wires one of
//! each from a single store, so callers build it once and share it behind
//! an `Arc`.

pub mod cancel;
pub mod comments;
pub mod identity;
pub mod sweeper;
pub mod threads;
pub mod upload;

#[cfg(test)]
mod testing;

use std::{sync::Arc, time::Duration};

use b04rd_core::{
  clock::Clock,
  lifecycle::LifecyclePolicy,
  remote::{AvatarSource, BlobStore},
  store::{CommentStore, SessionStore, ThreadStore},
};
use chrono::TimeDelta;

pub use comments::{CommentingPipeline, NewComment};
pub use identity::{IdentityManager, Resolution};
pub use threads::{NewThread, SweepReport, ThreadLifecycle};
pub use upload::{Attachment, UploadPipeline};

/// Tunables for [`Board::new`].
#[derive(Debug, Clone, Copy)]
pub struct BoardConfig {
  pub session_ttl:    TimeDelta,
  pub policy:         LifecyclePolicy,
  pub upload_timeout: Duration,
}

impl Default for BoardConfig {
  fn default() -> Self {
    Self {
      session_ttl:    TimeDelta::days(identity::DEFAULT_SESSION_TTL_DAYS),
      policy:         LifecyclePolicy::default(),
      upload_timeout: upload::DEFAULT_UPLOAD_TIMEOUT,
    }
  }
}

/// The full set of services over one store.
pub struct Board<S, A, B> {
  pub identity: IdentityManager<S, A>,
  pub threads:  ThreadLifecycle<S, B>,
  pub comments: CommentingPipeline<S, B>,
}

impl<S, A, B> Board<S, A, B>
where
  S: SessionStore + ThreadStore + CommentStore,
  A: AvatarSource,
  B: BlobStore + 'static,
{
  /// `thread_blobs` and `comment_blobs` are usually the same Blob Store
  /// pointed at different buckets.
  pub fn new(
    store: Arc<S>,
    avatars: Arc<A>,
    thread_blobs: Arc<B>,
    comment_blobs: Arc<B>,
    clock: Arc<dyn Clock>,
    config: BoardConfig,
  ) -> Self {
    let identity = IdentityManager::new(
      Arc::clone(&store),
      avatars,
      Arc::clone(&clock),
      config.session_ttl,
    );
    let threads = ThreadLifecycle::new(
      Arc::clone(&store),
      UploadPipeline::new(thread_blobs).with_timeout(config.upload_timeout),
      Arc::clone(&clock),
      config.policy,
    );
    let comments = CommentingPipeline::new(
      store,
      UploadPipeline::new(comment_blobs).with_timeout(config.upload_timeout),
      clock,
      config.policy,
    );
    Self { identity, threads, comments }
  }
}
