//! Test doubles for the engine's collaborators.

use std::{
  collections::HashSet,
  io,
  sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::Duration,
};

use b04rd_core::{
  comment::Comment,
  remote::{Avatar, AvatarSource, BlobStore},
  session::Session,
  store::{CommentStore, SessionStore, ThreadStore},
  thread::{Thread, ThreadFilter},
};
use b04rd_store_sqlite::SqliteStore;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::upload::Attachment;

pub fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap() }

pub fn png(name: &str) -> Attachment {
  Attachment {
    name:         name.to_owned(),
    content_type: "image/png".to_owned(),
    data:         Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
  }
}

pub fn gif(name: &str) -> Attachment {
  Attachment {
    name:         name.to_owned(),
    content_type: "image/gif".to_owned(),
    data:         Bytes::from_static(b"GIF89a"),
  }
}

// ─── Avatar Source ───────────────────────────────────────────────────────────

/// Hands out numbered avatars.
#[derive(Default)]
pub struct FakeAvatars {
  served: AtomicUsize,
}

impl AvatarSource for FakeAvatars {
  type Error = io::Error;

  async fn random_avatar(&self) -> Result<Avatar, Self::Error> {
    let n = self.served.fetch_add(1, Ordering::Relaxed) + 1;
    Ok(Avatar {
      image_url:    format!("https://avatars.test/{n}.jpeg"),
      display_name: format!("Morty #{n}"),
    })
  }
}

/// Always down.
pub struct FailingAvatars;

impl AvatarSource for FailingAvatars {
  type Error = io::Error;

  async fn random_avatar(&self) -> Result<Avatar, Self::Error> {
    Err(io::Error::other("portal gun out of fluid"))
  }
}

// ─── Blob Store ──────────────────────────────────────────────────────────────

/// Records every key it accepts; can refuse one content type or stall.
#[derive(Default)]
pub struct FakeBlobs {
  refuse: Option<String>,
  delay:  Option<Duration>,
  stored: Mutex<Vec<String>>,
}

impl FakeBlobs {
  pub fn refusing(content_type: &str) -> Self {
    Self { refuse: Some(content_type.to_owned()), ..Self::default() }
  }

  pub fn slow(delay: Duration) -> Self {
    Self { delay: Some(delay), ..Self::default() }
  }

  pub fn stored(&self) -> Vec<String> {
    self.stored.lock().unwrap().clone()
  }
}

impl BlobStore for FakeBlobs {
  type Error = io::Error;

  async fn put_object(
    &self,
    key: String,
    content_type: String,
    _data: Bytes,
  ) -> Result<String, Self::Error> {
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if self.refuse.as_deref() == Some(content_type.as_str()) {
      return Err(io::Error::other(format!("bucket refused {content_type}")));
    }
    self.stored.lock().unwrap().push(key.clone());
    Ok(format!("http://blobs.test/{key}"))
  }
}

// ─── Rigged store ────────────────────────────────────────────────────────────

/// An in-memory store that can be told to fail, to lose CAS races, or to
/// cancel a request mid-flight.
pub struct RiggedStore {
  pub inner:        SqliteStore,
  broken:           Mutex<HashSet<Uuid>>,
  sessions_down:    AtomicBool,
  interference:     Mutex<Option<DateTime<Utc>>>,
  races_lost:       AtomicUsize,
  cancel_on_insert: Mutex<Option<CancellationToken>>,
}

impl RiggedStore {
  pub async fn new() -> Self {
    Self {
      inner:            SqliteStore::open_in_memory().await.unwrap(),
      broken:           Mutex::new(HashSet::new()),
      sessions_down:    AtomicBool::new(false),
      interference:     Mutex::new(None),
      races_lost:       AtomicUsize::new(0),
      cancel_on_insert: Mutex::new(None),
    }
  }

  /// Every session lookup fails from now on. Inserts still succeed.
  pub fn break_session_lookups(&self) { self.sessions_down.store(true, Ordering::Relaxed); }

  /// Every update of `thread_id` fails from now on.
  pub fn break_thread(&self, thread_id: Uuid) {
    self.broken.lock().unwrap().insert(thread_id);
  }

  /// Before the next thread update goes through, a competing writer records
  /// a comment at `at`, so the caller's revision is stale.
  pub fn interfere_with_comment_at(&self, at: DateTime<Utc>) {
    *self.interference.lock().unwrap() = Some(at);
  }

  pub fn races_lost(&self) -> usize { self.races_lost.load(Ordering::Relaxed) }

  /// Fire `token` as soon as the next comment insert has committed.
  pub fn cancel_after_comment_insert(&self, token: CancellationToken) {
    *self.cancel_on_insert.lock().unwrap() = Some(token);
  }
}

impl SessionStore for RiggedStore {
  type Error = io::Error;

  async fn insert_session(&self, session: Session) -> Result<(), Self::Error> {
    self.inner.insert_session(session).await.map_err(io::Error::other)
  }

  async fn get_session(&self, id: Uuid) -> Result<Option<Session>, Self::Error> {
    if self.sessions_down.load(Ordering::Relaxed) {
      return Err(io::Error::other("session table locked"));
    }
    self.inner.get_session(id).await.map_err(io::Error::other)
  }

  async fn list_sessions(&self) -> Result<Vec<Session>, Self::Error> {
    self.inner.list_sessions().await.map_err(io::Error::other)
  }

  async fn rename_session(&self, id: Uuid, name: String) -> Result<bool, Self::Error> {
    self.inner.rename_session(id, name).await.map_err(io::Error::other)
  }

  async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, Self::Error> {
    self.inner.delete_expired_sessions(now).await.map_err(io::Error::other)
  }
}

impl ThreadStore for RiggedStore {
  type Error = io::Error;

  async fn insert_thread(&self, thread: Thread) -> Result<(), Self::Error> {
    self.inner.insert_thread(thread).await.map_err(io::Error::other)
  }

  async fn get_thread(&self, id: Uuid) -> Result<Option<Thread>, Self::Error> {
    self.inner.get_thread(id).await.map_err(io::Error::other)
  }

  async fn update_thread(&self, thread: Thread) -> Result<Option<Thread>, Self::Error> {
    let broken = self.broken.lock().unwrap().contains(&thread.thread_id);
    if broken {
      return Err(io::Error::other("disk full"));
    }

    let interference = self.interference.lock().unwrap().take();
    if let Some(at) = interference {
      let current = self.inner.get_thread(thread.thread_id).await.map_err(io::Error::other)?;
      if let Some(mut current) = current {
        current.record_comment(at);
        self.inner.update_thread(current).await.map_err(io::Error::other)?;
      }
    }

    let updated = self.inner.update_thread(thread).await.map_err(io::Error::other)?;
    if updated.is_none() {
      self.races_lost.fetch_add(1, Ordering::Relaxed);
    }
    Ok(updated)
  }

  async fn list_threads(&self, filter: ThreadFilter) -> Result<Vec<Thread>, Self::Error> {
    self.inner.list_threads(filter).await.map_err(io::Error::other)
  }
}

impl CommentStore for RiggedStore {
  type Error = io::Error;

  async fn insert_comment(&self, comment: Comment) -> Result<(), Self::Error> {
    self.inner.insert_comment(comment).await.map_err(io::Error::other)?;
    if let Some(token) = self.cancel_on_insert.lock().unwrap().take() {
      token.cancel();
    }
    Ok(())
  }

  async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, Self::Error> {
    self.inner.get_comment(id).await.map_err(io::Error::other)
  }

  async fn list_comments(&self, thread_id: Uuid) -> Result<Vec<Comment>, Self::Error> {
    self.inner.list_comments(thread_id).await.map_err(io::Error::other)
  }
}
