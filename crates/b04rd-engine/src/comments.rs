//! Commenting pipeline: persist a reply, then bump the owning thread's
//! `last_commented` marker.

use std::sync::Arc;

use b04rd_core::{
  Error, Result,
  clock::Clock,
  comment::Comment,
  lifecycle::LifecyclePolicy,
  remote::BlobStore,
  store::{CommentStore, ThreadStore},
  thread::Thread,
};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
  cancel::interruptible,
  threads::MAX_CAS_ATTEMPTS,
  upload::{Attachment, UploadPipeline},
};

/// Input to [`CommentingPipeline::create_comment`].
#[derive(Debug, Clone)]
pub struct NewComment {
  pub thread_id:  Uuid,
  pub parent_id:  Option<Uuid>,
  pub content:    String,
  pub attachment: Option<Attachment>,
  pub session_id: Uuid,
}

pub struct CommentingPipeline<S, B> {
  store:   Arc<S>,
  uploads: UploadPipeline<B>,
  clock:   Arc<dyn Clock>,
  policy:  LifecyclePolicy,
}

impl<S, B> CommentingPipeline<S, B>
where
  S: ThreadStore + CommentStore,
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

  /// Create a comment and advance its thread's activity marker.
  ///
  /// The thread and the parent comment are checked before anything is
  /// uploaded. Comments on archived threads are accepted; the thread stays
  /// archived. A thread already past its deadline is archived by the same
  /// update rather than revived.
  ///
  /// `cancel` is only honoured up to the insert. Once the comment is stored
  /// the bump runs to completion.
  pub async fn create_comment(
    &self,
    new: NewComment,
    cancel: &CancellationToken,
  ) -> Result<Comment> {
    if new.thread_id.is_nil() {
      return Err(Error::MissingThread);
    }
    let content = new.content.trim();
    if content.is_empty() {
      return Err(Error::EmptyContent);
    }
    if new.session_id.is_nil() {
      return Err(Error::MissingSession);
    }

    let thread = self.load_thread(new.thread_id, cancel).await?;

    if let Some(parent_id) = new.parent_id {
      let parent = interruptible(cancel, async {
        self.store.get_comment(parent_id).await.map_err(Error::storage)
      })
      .await?
      .ok_or(Error::CommentNotFound(parent_id))?;

      if parent.thread_id != thread.thread_id {
        return Err(Error::ForeignParent { parent: parent_id, thread: thread.thread_id });
      }
    }

    let image_url = match new.attachment {
      Some(file) => {
        let name = file.name.clone();
        let mut urls = self.uploads.upload_all(vec![file], cancel).await?;
        urls.remove(&name)
      }
      None => None,
    };

    let comment = Comment {
      comment_id: Uuid::new_v4(),
      thread_id: thread.thread_id,
      parent_id: new.parent_id,
      content: content.to_owned(),
      image_url,
      session_id: new.session_id,
      created_at: self.clock.now(),
    };

    interruptible(cancel, async {
      self
        .store
        .insert_comment(comment.clone())
        .await
        .map_err(Error::storage)
    })
    .await?;

    self.bump(thread, comment.created_at, &CancellationToken::new()).await?;

    tracing::info!(
      comment_id = %comment.comment_id,
      thread_id = %comment.thread_id,
      has_image = comment.image_url.is_some(),
      "comment created",
    );
    Ok(comment)
  }

  /// Every comment of a thread, oldest first.
  pub async fn list_by_thread(
    &self,
    thread_id: Uuid,
    cancel: &CancellationToken,
  ) -> Result<Vec<Comment>> {
    interruptible(cancel, async {
      self.store.list_comments(thread_id).await.map_err(Error::storage)
    })
    .await
  }

  async fn load_thread(&self, id: Uuid, cancel: &CancellationToken) -> Result<Thread> {
    interruptible(cancel, async {
      self.store.get_thread(id).await.map_err(Error::storage)
    })
    .await?
    .ok_or(Error::ThreadNotFound(id))
  }

  async fn bump(
    &self,
    mut thread: Thread,
    at: DateTime<Utc>,
    cancel: &CancellationToken,
  ) -> Result<Thread> {
    let thread_id = thread.thread_id;

    for attempt in 1..=MAX_CAS_ATTEMPTS {
      let archived = self.policy.apply(&mut thread, at);
      thread.record_comment(at);
      let stored = interruptible(cancel, async {
        self
          .store
          .update_thread(thread.clone())
          .await
          .map_err(Error::storage)
      })
      .await?;

      if let Some(updated) = stored {
        if let Some(reason) = archived {
          tracing::info!(%thread_id, ?reason, "thread archived");
        }
        return Ok(updated);
      }

      tracing::debug!(%thread_id, attempt, "thread changed during comment bump, retrying");
      thread = self.load_thread(thread_id, cancel).await?;
    }

    Err(Error::Contended(thread_id))
  }
}
