//! Thread lifecycle engine.
//!
//! Creation, reads with the archiving rule applied lazily, and the sweep
//! that persists `Active → Archived` transitions. Every persisted change
//! goes through the store's compare-and-swap on `revision`; a sweep that
//! loses a race re-reads the thread and evaluates the rule again.

use std::sync::Arc;

use b04rd_core::{
  Error, Result,
  clock::Clock,
  lifecycle::{ArchiveReason, LifecyclePolicy, ThreadState},
  remote::BlobStore,
  store::ThreadStore,
  thread::{Thread, ThreadFilter},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
  cancel::interruptible,
  upload::{Attachment, UploadPipeline},
};

/// How many times a thread update is retried after losing a revision race.
pub(crate) const MAX_CAS_ATTEMPTS: usize = 3;

/// Input to [`ThreadLifecycle::create`].
#[derive(Debug, Clone)]
pub struct NewThread {
  pub title:       String,
  pub content:     String,
  pub attachments: Vec<Attachment>,
  pub session_id:  Uuid,
}

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
  /// Unarchived threads the sweep looked at.
  pub examined: usize,
  /// Threads it moved to archived.
  pub archived: usize,
  /// Threads whose update failed.
  pub failed:   usize,
}

pub struct ThreadLifecycle<S, B> {
  store:   Arc<S>,
  uploads: UploadPipeline<B>,
  clock:   Arc<dyn Clock>,
  policy:  LifecyclePolicy,
}

impl<S, B> ThreadLifecycle<S, B>
where
  S: ThreadStore,
  B: BlobStore + 'static,
{
  pub fn new(
    store: Arc<S>,
    uploads: UploadPipeline<B>,
    clock: Arc<dyn Clock>,
    policy: LifecyclePolicy,
  ) -> Self {
    Self { store, uploads, clock, policy }
  }

  pub fn policy(&self) -> &LifecyclePolicy { &self.policy }

  /// The state a reader should see right now.
  pub fn state_of(&self, thread: &Thread) -> ThreadState {
    self.policy.state_at(thread, self.clock.now())
  }

  /// Validate, upload attachments, and persist a new active thread.
  ///
  /// Nothing is uploaded unless the text fields and the session pass
  /// validation. Attachment URLs keep the order the files were submitted in.
  pub async fn create(
    &self,
    new: NewThread,
    cancel: &CancellationToken,
  ) -> Result<Thread> {
    let title = new.title.trim();
    if title.is_empty() {
      return Err(Error::EmptyTitle);
    }
    let content = new.content.trim();
    if content.is_empty() {
      return Err(Error::EmptyContent);
    }
    if new.session_id.is_nil() {
      return Err(Error::MissingSession);
    }

    let order: Vec<String> = new.attachments.iter().map(|a| a.name.clone()).collect();
    let mut urls = self.uploads.upload_all(new.attachments, cancel).await?;
    let attachments = order.iter().filter_map(|name| urls.remove(name)).collect();

    let thread = Thread {
      thread_id: Uuid::new_v4(),
      title: title.to_owned(),
      content: content.to_owned(),
      attachments,
      session_id: new.session_id,
      created_at: self.clock.now(),
      last_commented: None,
      archived: false,
      revision: 0,
    };

    interruptible(cancel, async {
      self
        .store
        .insert_thread(thread.clone())
        .await
        .map_err(Error::storage)
    })
    .await?;

    tracing::info!(
      thread_id = %thread.thread_id,
      session_id = %thread.session_id,
      attachments = thread.attachments.len(),
      "thread created",
    );
    Ok(thread)
  }

  /// A single thread, archived or not.
  pub async fn get(&self, id: Uuid, cancel: &CancellationToken) -> Result<Thread> {
    interruptible(cancel, async {
      self.store.get_thread(id).await.map_err(Error::storage)
    })
    .await?
    .ok_or(Error::ThreadNotFound(id))
  }

  /// Threads that are active right now, most recently active first.
  ///
  /// Threads already due for archiving are left out even if the sweep has
  /// not reached them yet.
  pub async fn list_active(&self, cancel: &CancellationToken) -> Result<Vec<Thread>> {
    let threads = interruptible(cancel, async {
      self
        .store
        .list_threads(ThreadFilter::Unarchived)
        .await
        .map_err(Error::storage)
    })
    .await?;

    let now = self.clock.now();
    Ok(
      threads
        .into_iter()
        .filter(|t| self.policy.state_at(t, now).is_active())
        .collect(),
    )
  }

  /// Every thread, archived ones included.
  pub async fn list_all(&self, cancel: &CancellationToken) -> Result<Vec<Thread>> {
    interruptible(cancel, async {
      self
        .store
        .list_threads(ThreadFilter::All)
        .await
        .map_err(Error::storage)
    })
    .await
  }

  /// Apply the archiving rule to every unarchived thread and persist the
  /// transitions.
  ///
  /// A failure on one thread does not stop the batch; the last failure is
  /// returned once every thread has been tried. Cancellation stops the batch
  /// immediately.
  pub async fn cleanup_expired(&self, cancel: &CancellationToken) -> Result<SweepReport> {
    let threads = interruptible(cancel, async {
      self
        .store
        .list_threads(ThreadFilter::Unarchived)
        .await
        .map_err(Error::storage)
    })
    .await?;

    let mut report = SweepReport { examined: threads.len(), ..SweepReport::default() };
    let mut last_err = None;

    for thread in threads {
      let thread_id = thread.thread_id;
      match self.archive_if_due(thread, cancel).await {
        Ok(Some(_)) => report.archived += 1,
        Ok(None) => {}
        Err(Error::Cancelled) => return Err(Error::Cancelled),
        Err(err) => {
          tracing::error!(%thread_id, %err, "failed to archive thread");
          report.failed += 1;
          last_err = Some(err);
        }
      }
    }

    tracing::info!(
      examined = report.examined,
      archived = report.archived,
      failed = report.failed,
      "sweep finished",
    );

    match last_err {
      Some(err) => Err(err),
      None => Ok(report),
    }
  }

  async fn archive_if_due(
    &self,
    mut thread: Thread,
    cancel: &CancellationToken,
  ) -> Result<Option<ArchiveReason>> {
    let thread_id = thread.thread_id;

    for attempt in 1..=MAX_CAS_ATTEMPTS {
      let Some(reason) = self.policy.apply(&mut thread, self.clock.now()) else {
        return Ok(None);
      };

      let stored = interruptible(cancel, async {
        self
          .store
          .update_thread(thread.clone())
          .await
          .map_err(Error::storage)
      })
      .await?;

      if stored.is_some() {
        tracing::info!(%thread_id, ?reason, "thread archived");
        return Ok(Some(reason));
      }

      tracing::debug!(%thread_id, attempt, "thread changed during sweep, re-evaluating");
      thread = interruptible(cancel, async {
        self.store.get_thread(thread_id).await.map_err(Error::storage)
      })
      .await?
      .ok_or(Error::ThreadNotFound(thread_id))?;
    }

    Err(Error::Contended(thread_id))
  }
}

#[cfg(test)]
mod tests {
  use b04rd_core::clock::ManualClock;
  use b04rd_store_sqlite::SqliteStore;
  use chrono::TimeDelta;

  use super::*;
  use crate::testing::{FakeBlobs, RiggedStore, gif, png, t0};

  fn new_thread(session_id: Uuid) -> NewThread {
    NewThread {
      title: "t".into(),
      content: "c".into(),
      attachments: vec![],
      session_id,
    }
  }

  async fn engine(
    clock: &ManualClock,
  ) -> ThreadLifecycle<SqliteStore, FakeBlobs> {
    ThreadLifecycle::new(
      Arc::new(SqliteStore::open_in_memory().await.unwrap()),
      UploadPipeline::new(Arc::new(FakeBlobs::default())),
      Arc::new(clock.clone()),
      LifecyclePolicy::default(),
    )
  }

  async fn rigged(
    clock: &ManualClock,
  ) -> (Arc<RiggedStore>, ThreadLifecycle<RiggedStore, FakeBlobs>) {
    let store = Arc::new(RiggedStore::new().await);
    let engine = ThreadLifecycle::new(
      Arc::clone(&store),
      UploadPipeline::new(Arc::new(FakeBlobs::default())),
      Arc::new(clock.clone()),
      LifecyclePolicy::default(),
    );
    (store, engine)
  }

  // ─── Create ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn new_threads_start_active() {
    let clock = ManualClock::new(t0());
    let threads = engine(&clock).await;
    let cancel = CancellationToken::new();

    let t = threads.create(new_thread(Uuid::new_v4()), &cancel).await.unwrap();
    assert!(!t.archived);
    assert!(t.last_commented.is_none());
    assert_eq!(t.revision, 0);
    assert_eq!(t.created_at, t0());
    assert_eq!(threads.state_of(&t), ThreadState::Active);
    assert_eq!(threads.get(t.thread_id, &cancel).await.unwrap(), t);
  }

  #[tokio::test]
  async fn invalid_threads_upload_nothing() {
    let clock = ManualClock::new(t0());
    let blobs = Arc::new(FakeBlobs::default());
    let threads = ThreadLifecycle::new(
      Arc::new(SqliteStore::open_in_memory().await.unwrap()),
      UploadPipeline::new(Arc::clone(&blobs)),
      Arc::new(clock),
      LifecyclePolicy::default(),
    );
    let cancel = CancellationToken::new();

    let mut blank_title = new_thread(Uuid::new_v4());
    blank_title.title = "  ".into();
    blank_title.attachments = vec![png("a.png")];
    assert!(matches!(threads.create(blank_title, &cancel).await, Err(Error::EmptyTitle)));

    let mut blank_body = new_thread(Uuid::new_v4());
    blank_body.content = "\n".into();
    blank_body.attachments = vec![png("a.png")];
    assert!(matches!(threads.create(blank_body, &cancel).await, Err(Error::EmptyContent)));

    let mut no_session = new_thread(Uuid::nil());
    no_session.attachments = vec![png("a.png")];
    assert!(matches!(threads.create(no_session, &cancel).await, Err(Error::MissingSession)));

    assert!(blobs.stored().is_empty());
    assert!(threads.list_all(&cancel).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn attachments_keep_submission_order() {
    let clock = ManualClock::new(t0());
    let threads = engine(&clock).await;

    let mut new = new_thread(Uuid::new_v4());
    new.attachments = vec![png("z.png"), gif("a.gif"), png("m.png")];
    let t = threads.create(new, &CancellationToken::new()).await.unwrap();

    assert_eq!(t.attachments.len(), 3);
    assert!(t.attachments[0].ends_with(".png"));
    assert!(t.attachments[1].ends_with(".gif"));
    assert!(t.attachments[2].ends_with(".png"));
  }

  #[tokio::test]
  async fn failed_upload_creates_no_thread() {
    let clock = ManualClock::new(t0());
    let threads = ThreadLifecycle::new(
      Arc::new(SqliteStore::open_in_memory().await.unwrap()),
      UploadPipeline::new(Arc::new(FakeBlobs::refusing("image/gif"))),
      Arc::new(clock),
      LifecyclePolicy::default(),
    );
    let cancel = CancellationToken::new();

    let mut new = new_thread(Uuid::new_v4());
    new.attachments = vec![png("a.png"), gif("b.gif"), png("c.png")];
    assert!(matches!(threads.create(new, &cancel).await, Err(Error::Upload { .. })));
    assert!(threads.list_all(&cancel).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn get_unknown_thread_is_not_found() {
    let clock = ManualClock::new(t0());
    let threads = engine(&clock).await;
    let id = Uuid::new_v4();
    assert!(matches!(
      threads.get(id, &CancellationToken::new()).await,
      Err(Error::ThreadNotFound(missing)) if missing == id
    ));
  }

  // ─── Lazy reads ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn list_active_hides_threads_due_for_archiving() {
    let clock = ManualClock::new(t0());
    let threads = engine(&clock).await;
    let cancel = CancellationToken::new();
    let t = threads.create(new_thread(Uuid::new_v4()), &cancel).await.unwrap();

    clock.set(t0() + TimeDelta::seconds(9 * 60 + 59));
    assert_eq!(threads.list_active(&cancel).await.unwrap().len(), 1);

    clock.set(t0() + TimeDelta::seconds(10 * 60 + 1));
    assert!(threads.list_active(&cancel).await.unwrap().is_empty());

    // Not swept yet: the row itself is untouched.
    let stored = threads.get(t.thread_id, &cancel).await.unwrap();
    assert!(!stored.archived);
    assert_eq!(threads.state_of(&stored), ThreadState::Archived);
  }

  // ─── Sweep ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn sweep_archives_after_eleven_quiet_minutes() {
    let clock = ManualClock::new(t0());
    let threads = engine(&clock).await;
    let cancel = CancellationToken::new();

    let t = threads.create(new_thread(Uuid::new_v4()), &cancel).await.unwrap();
    assert!(t.last_commented.is_none());

    let report = threads.cleanup_expired(&cancel).await.unwrap();
    assert_eq!(report, SweepReport { examined: 1, archived: 0, failed: 0 });
    assert_eq!(threads.list_active(&cancel).await.unwrap().len(), 1);

    clock.advance(TimeDelta::minutes(11));
    let report = threads.cleanup_expired(&cancel).await.unwrap();
    assert_eq!(report.archived, 1);

    assert!(threads.list_active(&cancel).await.unwrap().is_empty());
    let all = threads.list_all(&cancel).await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].archived);
    assert_eq!(all[0].thread_id, t.thread_id);
  }

  #[tokio::test]
  async fn sweep_is_idempotent() {
    let clock = ManualClock::new(t0());
    let threads = engine(&clock).await;
    let cancel = CancellationToken::new();
    threads.create(new_thread(Uuid::new_v4()), &cancel).await.unwrap();

    clock.advance(TimeDelta::minutes(11));
    assert_eq!(threads.cleanup_expired(&cancel).await.unwrap().archived, 1);
    let second = threads.cleanup_expired(&cancel).await.unwrap();
    assert_eq!(second, SweepReport::default());
  }

  #[tokio::test]
  async fn sweep_continues_past_failures_and_reports_the_last_one() {
    let clock = ManualClock::new(t0());
    let (store, threads) = rigged(&clock).await;
    let cancel = CancellationToken::new();

    let broken = threads.create(new_thread(Uuid::new_v4()), &cancel).await.unwrap();
    let healthy = threads.create(new_thread(Uuid::new_v4()), &cancel).await.unwrap();
    store.break_thread(broken.thread_id);

    clock.advance(TimeDelta::minutes(11));
    let err = threads.cleanup_expired(&cancel).await.unwrap_err();
    assert!(matches!(err, Error::Storage(_)));

    assert!(threads.get(healthy.thread_id, &cancel).await.unwrap().archived);
    assert!(!threads.get(broken.thread_id, &cancel).await.unwrap().archived);
  }

  #[tokio::test]
  async fn sweep_that_loses_a_race_re_evaluates() {
    let clock = ManualClock::new(t0());
    let (store, threads) = rigged(&clock).await;
    let cancel = CancellationToken::new();
    let t = threads.create(new_thread(Uuid::new_v4()), &cancel).await.unwrap();

    // A comment lands between the sweep's read and its write.
    clock.advance(TimeDelta::minutes(11));
    store.interfere_with_comment_at(clock.now());

    let report = threads.cleanup_expired(&cancel).await.unwrap();
    assert_eq!(report.archived, 0);
    assert_eq!(store.races_lost(), 1);

    let stored = threads.get(t.thread_id, &cancel).await.unwrap();
    assert!(!stored.archived);
    assert_eq!(stored.last_commented, Some(clock.now()));
  }

  #[tokio::test]
  async fn cancelled_sweep_stops() {
    let clock = ManualClock::new(t0());
    let threads = engine(&clock).await;
    let cancel = CancellationToken::new();
    threads.create(new_thread(Uuid::new_v4()), &cancel).await.unwrap();
    clock.advance(TimeDelta::minutes(11));

    cancel.cancel();
    assert!(matches!(threads.cleanup_expired(&cancel).await, Err(Error::Cancelled)));
    assert!(!threads.list_all(&CancellationToken::new()).await.unwrap()[0].archived);
  }
}
