//! Session — the anonymous, time-limited identity of a visitor.
//!
//! A session is minted with a random avatar and lives until `expires_at`.
//! Threads and comments keep only the session id; once the session is purged
//! their author is rendered as [`Author::anonymous`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Display name shown for content whose session is gone.
pub const ANONYMOUS: &str = "Anonymous";

/// Upper bound on a user-chosen display name, in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub session_id:   Uuid,
  pub avatar_url:   String,
  pub display_name: String,
  pub created_at:   DateTime<Utc>,
  pub expires_at:   DateTime<Utc>,
}

impl Session {
  /// A session is live strictly before its expiry instant.
  pub fn is_live(&self, now: DateTime<Utc>) -> bool { now < self.expires_at }

  pub fn author(&self) -> Author {
    Author {
      display_name: self.display_name.clone(),
      avatar_url:   Some(self.avatar_url.clone()),
    }
  }
}

/// The public face of a session, attached to threads and comments on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
  pub display_name: String,
  pub avatar_url:   Option<String>,
}

impl Author {
  pub fn anonymous() -> Self {
    Self {
      display_name: ANONYMOUS.to_owned(),
      avatar_url:   None,
    }
  }
}

/// Trim a requested display name and check it against the length bound.
pub fn normalize_display_name(raw: &str) -> Result<String> {
  let name = raw.trim();
  if name.is_empty() {
    return Err(Error::EmptyDisplayName);
  }
  if name.chars().count() > MAX_DISPLAY_NAME_LEN {
    return Err(Error::DisplayNameTooLong(MAX_DISPLAY_NAME_LEN));
  }
  Ok(name.to_owned())
}
