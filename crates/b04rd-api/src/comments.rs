//! Handlers for comment endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/threads/{id}/comments` | Oldest first; 404 if no thread |
//! | `POST` | `/api/threads/{id}/comments` | Multipart; 201 |
//! | `POST` | `/submit-comment` | Multipart with `thread_id`; 303 to `/post/{id}` |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Redirect},
};
use b04rd_core::{comment::Comment, session::Author};
use b04rd_engine::NewComment;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
  AppState, Backend,
  error::ApiError,
  form::CommentForm,
  session::{CurrentSession, RequestCancel},
  views::CommentView,
};

async fn post_comment<K: Backend>(
  state: &AppState<K>,
  thread_id: Uuid,
  session_id: Uuid,
  form: CommentForm,
  cancel: &CancellationToken,
) -> Result<Comment, ApiError> {
  let comment = state
    .board
    .comments
    .create_comment(
      NewComment {
        thread_id,
        parent_id: form.parent_id,
        content: form.content,
        attachment: form.file,
        session_id,
      },
      cancel,
    )
    .await?;
  Ok(comment)
}

/// `GET /api/threads/{id}/comments`
pub async fn list<K: Backend>(
  State(state): State<AppState<K>>,
  RequestCancel(cancel): RequestCancel,
  Path(thread_id): Path<Uuid>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
  // 404 rather than an empty list for unknown threads.
  state.board.threads.get(thread_id, &cancel).await?;
  let comments = state.board.comments.list_by_thread(thread_id, &cancel).await?;

  let owners: Vec<Uuid> = comments.iter().map(|c| c.session_id).collect();
  let authors = state.board.identity.authors(owners, &cancel).await?;

  Ok(Json(
    comments
      .into_iter()
      .map(|c| {
        let author = authors.get(&c.session_id).cloned().unwrap_or_else(Author::anonymous);
        CommentView::new(c, author)
      })
      .collect(),
  ))
}

/// `POST /api/threads/{id}/comments`
pub async fn create<K: Backend>(
  State(state): State<AppState<K>>,
  CurrentSession(session): CurrentSession,
  RequestCancel(cancel): RequestCancel,
  Path(thread_id): Path<Uuid>,
  form: CommentForm,
) -> Result<impl IntoResponse, ApiError> {
  if form.thread_id.is_some_and(|id| id != thread_id) {
    return Err(ApiError::BadRequest("thread_id does not match the path".into()));
  }
  let comment = post_comment(&state, thread_id, session.session_id, form, &cancel).await?;
  Ok((StatusCode::CREATED, Json(CommentView::new(comment, session.author()))))
}

/// `POST /submit-comment`
pub async fn submit_comment<K: Backend>(
  State(state): State<AppState<K>>,
  CurrentSession(session): CurrentSession,
  RequestCancel(cancel): RequestCancel,
  form: CommentForm,
) -> Result<Redirect, ApiError> {
  // A missing id is left to the pipeline, which reports it as validation.
  let thread_id = form.thread_id.unwrap_or_else(Uuid::nil);
  let comment = post_comment(&state, thread_id, session.session_id, form, &cancel).await?;
  Ok(Redirect::to(&format!("/post/{}", comment.thread_id)))
}
