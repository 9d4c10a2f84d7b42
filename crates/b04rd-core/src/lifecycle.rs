//! Thread lifecycle: the `Active → Archived` state machine.
//!
//! The archiving rule is a pure function of a thread and the current time.
//! It is applied twice: lazily on read, so the active listing never shows a
//! thread that is already due, and eagerly by the periodic sweep, which
//! persists the transition. Because both paths share [`LifecyclePolicy`],
//! the visible active set does not depend on how often the sweep runs.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::thread::Thread;

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadState {
  Active,
  /// Terminal.
  Archived,
}

impl ThreadState {
  pub fn is_active(&self) -> bool { matches!(self, Self::Active) }
}

/// Why the rule wants a thread archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveReason {
  /// Nobody replied within the uncommented window.
  NeverCommented,
  /// The last reply is older than the commented window.
  Inactive,
}

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Inactivity windows for the archiving rule.
///
/// Both comparisons are strict: a thread exactly at the boundary is still
/// active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
  /// How long a thread with no comments stays active after creation.
  pub uncommented_ttl: TimeDelta,
  /// How long a thread stays active after its most recent comment.
  pub commented_ttl:   TimeDelta,
}

impl Default for LifecyclePolicy {
  fn default() -> Self {
    Self {
      uncommented_ttl: TimeDelta::minutes(10),
      commented_ttl:   TimeDelta::minutes(15),
    }
  }
}

impl LifecyclePolicy {
  /// Evaluate the rule, ignoring the persisted `archived` flag.
  pub fn archive_reason(
    &self,
    thread: &Thread,
    now: DateTime<Utc>,
  ) -> Option<ArchiveReason> {
    match thread.last_commented {
      None if now - thread.created_at > self.uncommented_ttl => {
        Some(ArchiveReason::NeverCommented)
      }
      Some(at) if now - at > self.commented_ttl => Some(ArchiveReason::Inactive),
      _ => None,
    }
  }

  /// The state a reader should see at `now`.
  pub fn state_at(&self, thread: &Thread, now: DateTime<Utc>) -> ThreadState {
    if thread.archived || self.archive_reason(thread, now).is_some() {
      ThreadState::Archived
    } else {
      ThreadState::Active
    }
  }

  /// Apply the transition in place. Returns the reason when the thread moved
  /// from active to archived, `None` if nothing changed (including when it
  /// was already archived).
  pub fn apply(&self, thread: &mut Thread, now: DateTime<Utc>) -> Option<ArchiveReason> {
    if thread.archived {
      return None;
    }
    let reason = self.archive_reason(thread, now)?;
    thread.archived = true;
    Some(reason)
  }
}
