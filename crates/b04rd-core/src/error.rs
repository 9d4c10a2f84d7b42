//! Error types for `b04rd-core`.
//!
//! One enum covers every failure the core operations can report. Callers
//! that need to map failures onto a transport (HTTP status codes, exit
//! codes) should match on [`Error::kind`] rather than on the variants.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  // ── Validation ────────────────────────────────────────────────────────

  #[error("thread title cannot be empty")]
  EmptyTitle,

  #[error("content cannot be empty")]
  EmptyContent,

  #[error("display name cannot be empty")]
  EmptyDisplayName,

  #[error("display name is longer than {0} characters")]
  DisplayNameTooLong(usize),

  #[error("a session is required")]
  MissingSession,

  #[error("a thread id is required")]
  MissingThread,

  #[error("duplicate attachment name: {0:?}")]
  DuplicateAttachment(String),

  #[error("parent comment {parent} does not belong to thread {thread}")]
  ForeignParent { parent: Uuid, thread: Uuid },

  // ── Not found ─────────────────────────────────────────────────────────

  #[error("session not found: {0}")]
  SessionNotFound(Uuid),

  #[error("thread not found: {0}")]
  ThreadNotFound(Uuid),

  #[error("comment not found: {0}")]
  CommentNotFound(Uuid),

  // ── Upstream ──────────────────────────────────────────────────────────

  #[error("failed to assign avatar: {0}")]
  AvatarAssignment(#[source] BoxError),

  #[error("upload failed for {failed} of {total} attachment(s): {detail}")]
  Upload {
    failed: usize,
    total:  usize,
    detail: String,
  },

  #[error("attachment upload timed out after {0:?}")]
  UploadTimeout(Duration),

  // ── Cancellation ──────────────────────────────────────────────────────

  #[error("operation cancelled")]
  Cancelled,

  // ── Storage ───────────────────────────────────────────────────────────

  #[error("storage error: {0}")]
  Storage(#[source] BoxError),

  #[error("thread {0} kept changing while it was being updated")]
  Contended(Uuid),
}

/// Coarse classification of an [`Error`], used by transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// The caller supplied an empty or zero-valued required field.
  Validation,
  /// The referenced session, thread or comment does not exist.
  NotFound,
  /// The Avatar Source or the Blob Store failed or timed out.
  Upstream,
  /// The caller went away before the operation finished.
  Cancelled,
  /// The relational store failed.
  Storage,
}

impl Error {
  /// Wrap a backend error as [`Error::Storage`].
  pub fn storage<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Storage(Box::new(err))
  }

  /// Wrap an Avatar Source error as [`Error::AvatarAssignment`].
  pub fn avatar<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::AvatarAssignment(Box::new(err))
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::EmptyTitle
      | Self::EmptyContent
      | Self::EmptyDisplayName
      | Self::DisplayNameTooLong(_)
      | Self::MissingSession
      | Self::MissingThread
      | Self::DuplicateAttachment(_)
      | Self::ForeignParent { .. } => ErrorKind::Validation,
      Self::SessionNotFound(_)
      | Self::ThreadNotFound(_)
      | Self::CommentNotFound(_) => ErrorKind::NotFound,
      Self::AvatarAssignment(_)
      | Self::Upload { .. }
      | Self::UploadTimeout(_) => ErrorKind::Upstream,
      Self::Cancelled => ErrorKind::Cancelled,
      Self::Storage(_) | Self::Contended(_) => ErrorKind::Storage,
    }
  }

  pub fn is_client_error(&self) -> bool {
    matches!(self.kind(), ErrorKind::Validation | ErrorKind::NotFound)
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn validation_and_not_found_are_client_errors() {
    assert!(Error::EmptyTitle.is_client_error());
    assert!(Error::ThreadNotFound(Uuid::nil()).is_client_error());
    assert!(!Error::Cancelled.is_client_error());
    assert!(!Error::UploadTimeout(Duration::from_secs(15)).is_client_error());
  }

  #[test]
  fn storage_wraps_the_source() {
    let err = Error::storage(std::io::Error::other("disk on fire"));
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(err.to_string().contains("disk on fire"));
  }
}
