//! Typed multipart forms for thread and comment submission.
//!
//! Multipart bodies are read once, here, into [`ThreadForm`] or
//! [`CommentForm`]. Text parts are matched by name (with the legacy
//! `subject`/`comment` aliases); any part carrying a filename is a file.

use std::collections::{HashMap, HashSet};

use axum::extract::{FromRequest, Multipart, Request, multipart::MultipartError};
use b04rd_engine::Attachment;
use uuid::Uuid;

use crate::error::ApiError;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// `POST /api/threads` and `POST /submit-post`.
#[derive(Debug, Default)]
pub struct ThreadForm {
  pub title:   String,
  pub content: String,
  /// Requested display name for the submitter, if any.
  pub name:    Option<String>,
  pub files:   Vec<Attachment>,
}

/// `POST /api/threads/{id}/comments` and `POST /submit-comment`.
#[derive(Debug, Default)]
pub struct CommentForm {
  /// Only sent to `/submit-comment`; the nested route takes it from the path.
  pub thread_id: Option<Uuid>,
  pub parent_id: Option<Uuid>,
  pub content:   String,
  pub file:      Option<Attachment>,
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct RawForm {
  text:  HashMap<String, String>,
  files: Vec<Attachment>,
}

impl RawForm {
  fn take(&mut self, names: &[&str]) -> Option<String> {
    names.iter().find_map(|n| self.text.remove(*n))
  }

  fn take_uuid(&mut self, name: &str) -> Result<Option<Uuid>, ApiError> {
    match self.take(&[name]) {
      Some(raw) if !raw.trim().is_empty() => Uuid::parse_str(raw.trim())
        .map(Some)
        .map_err(|_| ApiError::BadRequest(format!("{name} is not a valid id"))),
      _ => Ok(None),
    }
  }
}

fn bad_part(err: MultipartError) -> ApiError {
  ApiError::BadRequest(err.body_text())
}

async fn read_form(req: Request) -> Result<RawForm, ApiError> {
  let mut multipart = Multipart::from_request(req, &())
    .await
    .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

  let mut form = RawForm::default();
  let mut used_names = HashSet::new();

  while let Some(field) = multipart.next_field().await.map_err(bad_part)? {
    let part = field.name().unwrap_or_default().to_owned();

    match field.file_name().map(str::to_owned) {
      Some(file_name) => {
        let content_type = field
          .content_type()
          .unwrap_or(FALLBACK_CONTENT_TYPE)
          .to_owned();
        let data = field.bytes().await.map_err(bad_part)?;
        // Browsers send an empty, nameless part for an untouched file input.
        if file_name.is_empty() && data.is_empty() {
          continue;
        }

        let base = if file_name.is_empty() { part } else { file_name };
        let mut name = base.clone();
        let mut n = 1;
        while !used_names.insert(name.clone()) {
          n += 1;
          name = format!("{base} ({n})");
        }
        form.files.push(Attachment { name, content_type, data });
      }
      None => {
        let value = field.text().await.map_err(bad_part)?;
        form.text.insert(part, value);
      }
    }
  }

  Ok(form)
}

// ─── Extractors ──────────────────────────────────────────────────────────────

impl<S: Send + Sync> FromRequest<S> for ThreadForm {
  type Rejection = ApiError;

  async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
    let mut raw = read_form(req).await?;
    Ok(ThreadForm {
      title:   raw.take(&["title", "subject"]).unwrap_or_default(),
      content: raw.take(&["content", "comment"]).unwrap_or_default(),
      name:    raw.take(&["name"]).filter(|n| !n.trim().is_empty()),
      files:   raw.files,
    })
  }
}

impl<S: Send + Sync> FromRequest<S> for CommentForm {
  type Rejection = ApiError;

  async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
    let mut raw = read_form(req).await?;
    let thread_id = raw.take_uuid("thread_id")?;
    let parent_id = raw.take_uuid("parent_id")?;
    let content = raw.take(&["content", "comment"]).unwrap_or_default();

    if raw.files.len() > 1 {
      return Err(ApiError::BadRequest("a comment takes at most one file".into()));
    }
    Ok(CommentForm { thread_id, parent_id, content, file: raw.files.pop() })
  }
}
