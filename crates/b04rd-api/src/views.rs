//! JSON shapes returned by the API.
//!
//! Session ids double as bearer tokens, so only [`MeView`] ever carries one;
//! threads, comments and session listings expose the author instead.

use b04rd_core::{
  comment::Comment,
  lifecycle::ThreadState,
  session::{Author, Session},
  thread::Thread,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ThreadView {
  pub thread_id:      Uuid,
  pub title:          String,
  pub content:        String,
  pub attachments:    Vec<String>,
  pub created_at:     DateTime<Utc>,
  pub last_commented: Option<DateTime<Utc>>,
  pub state:          ThreadState,
  pub author:         Author,
}

impl ThreadView {
  pub fn new(thread: Thread, state: ThreadState, author: Author) -> Self {
    Self {
      thread_id: thread.thread_id,
      title: thread.title,
      content: thread.content,
      attachments: thread.attachments,
      created_at: thread.created_at,
      last_commented: thread.last_commented,
      state,
      author,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct CommentView {
  pub comment_id: Uuid,
  pub thread_id:  Uuid,
  pub parent_id:  Option<Uuid>,
  pub content:    String,
  pub image_url:  Option<String>,
  pub created_at: DateTime<Utc>,
  pub author:     Author,
}

impl CommentView {
  pub fn new(comment: Comment, author: Author) -> Self {
    Self {
      comment_id: comment.comment_id,
      thread_id:  comment.thread_id,
      parent_id:  comment.parent_id,
      content:    comment.content,
      image_url:  comment.image_url,
      created_at: comment.created_at,
      author,
    }
  }
}

/// A live session as seen by other visitors.
#[derive(Debug, Serialize)]
pub struct SessionView {
  pub display_name: String,
  pub avatar_url:   String,
  pub created_at:   DateTime<Utc>,
  pub expires_at:   DateTime<Utc>,
}

impl From<Session> for SessionView {
  fn from(s: Session) -> Self {
    Self {
      display_name: s.display_name,
      avatar_url:   s.avatar_url,
      created_at:   s.created_at,
      expires_at:   s.expires_at,
    }
  }
}

/// The caller's own session.
#[derive(Debug, Serialize)]
pub struct MeView {
  pub session_id: Uuid,
  #[serde(flatten)]
  pub session:    SessionView,
}

impl From<Session> for MeView {
  fn from(s: Session) -> Self {
    Self { session_id: s.session_id, session: s.into() }
  }
}
