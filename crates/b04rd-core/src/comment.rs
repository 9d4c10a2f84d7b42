//! Comment — an immutable reply to a thread, optionally nested under
//! another comment of the same thread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
  pub comment_id: Uuid,
  pub thread_id:  Uuid,
  pub parent_id:  Option<Uuid>,
  pub content:    String,
  pub image_url:  Option<String>,
  pub session_id: Uuid,
  pub created_at: DateTime<Utc>,
}
