//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so they sort lexically. The attachment list is
//! stored as a compact JSON array. UUIDs are stored as hyphenated lowercase
//! strings.

use b04rd_core::{comment::Comment, session::Session, thread::Thread};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Attachments ──────────────────────────────────────────────────────────────

pub fn encode_attachments(urls: &[String]) -> Result<String> {
  Ok(serde_json::to_string(urls)?)
}

pub fn decode_attachments(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `sessions` row.
pub struct RawSession {
  pub session_id:   String,
  pub avatar_url:   String,
  pub display_name: String,
  pub created_at:   String,
  pub expires_at:   String,
}

pub const SESSION_COLUMNS: &str =
  "session_id, avatar_url, display_name, created_at, expires_at";

impl RawSession {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session_id:   row.get(0)?,
      avatar_url:   row.get(1)?,
      display_name: row.get(2)?,
      created_at:   row.get(3)?,
      expires_at:   row.get(4)?,
    })
  }

  pub fn into_session(self) -> Result<Session> {
    Ok(Session {
      session_id:   decode_uuid(&self.session_id)?,
      avatar_url:   self.avatar_url,
      display_name: self.display_name,
      created_at:   decode_dt(&self.created_at)?,
      expires_at:   decode_dt(&self.expires_at)?,
    })
  }
}

/// Raw strings read directly from a `threads` row.
pub struct RawThread {
  pub thread_id:      String,
  pub title:          String,
  pub content:        String,
  pub attachments:    String,
  pub session_id:     String,
  pub created_at:     String,
  pub last_commented: Option<String>,
  pub archived:       bool,
  pub revision:       i64,
}

pub const THREAD_COLUMNS: &str = "thread_id, title, content, attachments, session_id, \
   created_at, last_commented, archived, revision";

impl RawThread {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      thread_id:      row.get(0)?,
      title:          row.get(1)?,
      content:        row.get(2)?,
      attachments:    row.get(3)?,
      session_id:     row.get(4)?,
      created_at:     row.get(5)?,
      last_commented: row.get(6)?,
      archived:       row.get(7)?,
      revision:       row.get(8)?,
    })
  }

  pub fn into_thread(self) -> Result<Thread> {
    Ok(Thread {
      thread_id:      decode_uuid(&self.thread_id)?,
      title:          self.title,
      content:        self.content,
      attachments:    decode_attachments(&self.attachments)?,
      session_id:     decode_uuid(&self.session_id)?,
      created_at:     decode_dt(&self.created_at)?,
      last_commented: self.last_commented.as_deref().map(decode_dt).transpose()?,
      archived:       self.archived,
      revision:       self.revision.max(0) as u64,
    })
  }
}

/// Raw strings read directly from a `comments` row.
pub struct RawComment {
  pub comment_id: String,
  pub thread_id:  String,
  pub parent_id:  Option<String>,
  pub content:    String,
  pub image_url:  Option<String>,
  pub session_id: String,
  pub created_at: String,
}

pub const COMMENT_COLUMNS: &str =
  "comment_id, thread_id, parent_id, content, image_url, session_id, created_at";

impl RawComment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      comment_id: row.get(0)?,
      thread_id:  row.get(1)?,
      parent_id:  row.get(2)?,
      content:    row.get(3)?,
      image_url:  row.get(4)?,
      session_id: row.get(5)?,
      created_at: row.get(6)?,
    })
  }

  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      comment_id: decode_uuid(&self.comment_id)?,
      thread_id:  decode_uuid(&self.thread_id)?,
      parent_id:  self.parent_id.as_deref().map(decode_uuid).transpose()?,
      content:    self.content,
      image_url:  self.image_url,
      session_id: decode_uuid(&self.session_id)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
