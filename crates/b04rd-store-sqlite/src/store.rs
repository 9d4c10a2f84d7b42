//! [`SqliteStore`] — the SQLite implementation of the b04rd store traits.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use b04rd_core::{
  comment::Comment,
  session::Session,
  store::{CommentStore, SessionStore, ThreadStore},
  thread::{Thread, ThreadFilter},
};

use crate::{
  encode::{
    COMMENT_COLUMNS, RawComment, RawSession, RawThread, SESSION_COLUMNS,
    THREAD_COLUMNS, encode_attachments, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
  Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A b04rd store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── SessionStore impl ───────────────────────────────────────────────────────

impl SessionStore for SqliteStore {
  type Error = crate::Error;

  async fn insert_session(&self, session: Session) -> Result<()> {
    let id_str      = encode_uuid(session.session_id);
    let created_str = encode_dt(session.created_at);
    let expires_str = encode_dt(session.expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (session_id, avatar_url, display_name, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            id_str,
            session.avatar_url,
            session.display_name,
            created_str,
            expires_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1"),
            rusqlite::params![id_str],
            RawSession::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  async fn list_sessions(&self) -> Result<Vec<Session>> {
    let raws: Vec<RawSession> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map([], RawSession::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSession::into_session).collect()
  }

  async fn rename_session(&self, id: Uuid, display_name: String) -> Result<bool> {
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE sessions SET display_name = ?1 WHERE session_id = ?2",
          rusqlite::params![display_name, id_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
    let now_str = encode_dt(now);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM sessions WHERE expires_at < ?1",
          rusqlite::params![now_str],
        )?)
      })
      .await?;

    Ok(deleted as u64)
  }
}

// ─── ThreadStore impl ────────────────────────────────────────────────────────

impl ThreadStore for SqliteStore {
  type Error = crate::Error;

  async fn insert_thread(&self, thread: Thread) -> Result<()> {
    let id_str          = encode_uuid(thread.thread_id);
    let session_str     = encode_uuid(thread.session_id);
    let attachments_str = encode_attachments(&thread.attachments)?;
    let created_str     = encode_dt(thread.created_at);
    let commented_str   = thread.last_commented.map(encode_dt);
    let revision        = thread.revision as i64;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO threads (
             thread_id, title, content, attachments, session_id,
             created_at, last_commented, archived, revision
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str,
            thread.title,
            thread.content,
            attachments_str,
            session_str,
            created_str,
            commented_str,
            thread.archived,
            revision,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_thread(&self, id: Uuid) -> Result<Option<Thread>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawThread> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {THREAD_COLUMNS} FROM threads WHERE thread_id = ?1"),
            rusqlite::params![id_str],
            RawThread::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawThread::into_thread).transpose()
  }

  async fn update_thread(&self, thread: Thread) -> Result<Option<Thread>> {
    let id_str          = encode_uuid(thread.thread_id);
    let attachments_str = encode_attachments(&thread.attachments)?;
    let commented_str   = thread.last_commented.map(encode_dt);
    let expected        = thread.revision as i64;

    // `archived = MAX(archived, ?)` keeps the flag monotonic even if a
    // caller hands back a stale copy with the right revision.
    let raw: Option<RawThread> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE threads
              SET title          = ?2,
                  content        = ?3,
                  attachments    = ?4,
                  last_commented = ?5,
                  archived       = MAX(archived, ?6),
                  revision       = revision + 1
            WHERE thread_id = ?1 AND revision = ?7",
          rusqlite::params![
            id_str,
            thread.title,
            thread.content,
            attachments_str,
            commented_str,
            thread.archived,
            expected,
          ],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        let raw = tx.query_row(
          &format!("SELECT {THREAD_COLUMNS} FROM threads WHERE thread_id = ?1"),
          rusqlite::params![id_str],
          RawThread::from_row,
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    raw.map(RawThread::into_thread).transpose()
  }

  async fn list_threads(&self, filter: ThreadFilter) -> Result<Vec<Thread>> {
    let where_clause = match filter {
      ThreadFilter::Unarchived => "WHERE archived = 0",
      ThreadFilter::All => "",
    };

    let raws: Vec<RawThread> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {THREAD_COLUMNS} FROM threads
           {where_clause}
           ORDER BY COALESCE(last_commented, created_at) DESC"
        ))?;
        let rows = stmt
          .query_map([], RawThread::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawThread::into_thread).collect()
  }
}

// ─── CommentStore impl ───────────────────────────────────────────────────────

impl CommentStore for SqliteStore {
  type Error = crate::Error;

  async fn insert_comment(&self, comment: Comment) -> Result<()> {
    let id_str      = encode_uuid(comment.comment_id);
    let thread_str  = encode_uuid(comment.thread_id);
    let parent_str  = comment.parent_id.map(encode_uuid);
    let session_str = encode_uuid(comment.session_id);
    let created_str = encode_dt(comment.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO comments (
             comment_id, thread_id, parent_id, content, image_url, session_id, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            id_str,
            thread_str,
            parent_str,
            comment.content,
            comment.image_url,
            session_str,
            created_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawComment> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE comment_id = ?1"),
            rusqlite::params![id_str],
            RawComment::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawComment::into_comment).transpose()
  }

  async fn list_comments(&self, thread_id: Uuid) -> Result<Vec<Comment>> {
    let thread_str = encode_uuid(thread_id);

    let raws: Vec<RawComment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {COMMENT_COLUMNS} FROM comments
           WHERE thread_id = ?1
           ORDER BY created_at, comment_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![thread_str], RawComment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawComment::into_comment).collect()
  }
}
