//! Persistence traits for sessions, threads and comments.
//!
//! The traits are implemented by storage backends (e.g. `b04rd-store-sqlite`).
//! The engine depends on these abstractions, not on any concrete backend.
//!
//! All methods return `Send` futures so implementations can be shared across
//! a multi-threaded tokio runtime. Arguments are taken by value so the
//! returned futures borrow nothing but `self`.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  comment::Comment,
  session::Session,
  thread::{Thread, ThreadFilter},
};

// ─── Sessions ────────────────────────────────────────────────────────────────

/// Durable key-value storage for session records.
pub trait SessionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn insert_session(
    &self,
    session: Session,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Retrieve a session by id, expired or not. `None` if absent.
  fn get_session(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  /// Every stored session, including expired rows not yet purged.
  fn list_sessions(
    &self,
  ) -> impl Future<Output = Result<Vec<Session>, Self::Error>> + Send + '_;

  /// Set the display name. Returns `false` if no such session exists.
  fn rename_session(
    &self,
    id: Uuid,
    display_name: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete every session with `expires_at < now`; returns the row count.
  fn delete_expired_sessions(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}

// ─── Threads ─────────────────────────────────────────────────────────────────

pub trait ThreadStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn insert_thread(
    &self,
    thread: Thread,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_thread(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Thread>, Self::Error>> + Send + '_;

  /// Compare-and-swap update keyed on `thread.revision`.
  ///
  /// Succeeds only if the stored revision equals `thread.revision`; the
  /// stored revision is then incremented and the updated thread returned.
  /// Returns `None` when the row is missing or its revision has moved on.
  /// Implementations must never clear a persisted `archived` flag.
  fn update_thread(
    &self,
    thread: Thread,
  ) -> impl Future<Output = Result<Option<Thread>, Self::Error>> + Send + '_;

  /// List threads, most recently active first.
  fn list_threads(
    &self,
    filter: ThreadFilter,
  ) -> impl Future<Output = Result<Vec<Thread>, Self::Error>> + Send + '_;
}

// ─── Comments ────────────────────────────────────────────────────────────────

pub trait CommentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn insert_comment(
    &self,
    comment: Comment,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_comment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Comment>, Self::Error>> + Send + '_;

  /// All comments of a thread, oldest first.
  fn list_comments(
    &self,
    thread_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Comment>, Self::Error>> + Send + '_;
}
