//! Thread — a top-level post that opens a discussion.
//!
//! Threads are never deleted. They move from active to archived once they
//! go quiet (see [`crate::lifecycle`]), and archived threads stay readable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
  pub thread_id:      Uuid,
  pub title:          String,
  pub content:        String,
  /// Blob Store URLs, in submission order.
  pub attachments:    Vec<String>,
  pub session_id:     Uuid,
  pub created_at:     DateTime<Utc>,
  pub last_commented: Option<DateTime<Utc>>,
  /// Monotonic: once set it is never cleared.
  pub archived:       bool,
  /// Bumped by the store on every successful update; used for
  /// compare-and-swap between the sweep and comment bumps.
  pub revision:       u64,
}

impl Thread {
  /// The instant the inactivity clock runs from.
  pub fn last_activity(&self) -> DateTime<Utc> {
    self.last_commented.unwrap_or(self.created_at)
  }

  /// Advance `last_commented` to `at`. Never moves it backwards and never
  /// before `created_at`.
  pub fn record_comment(&mut self, at: DateTime<Utc>) {
    let at = at.max(self.created_at);
    self.last_commented = Some(match self.last_commented {
      Some(prev) => prev.max(at),
      None => at,
    });
  }
}

/// Which threads [`crate::store::ThreadStore::list_threads`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadFilter {
  /// Threads whose persisted `archived` flag is still false.
  Unarchived,
  All,
}
