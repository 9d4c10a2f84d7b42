//! Handlers for thread endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/threads` | Active threads only |
//! | `GET`  | `/api/threads/all` | Archived threads too |
//! | `POST` | `/api/threads` | Multipart; 201 |
//! | `GET`  | `/api/threads/{id}` | 404 if not found |
//! | `POST` | `/submit-post` | Multipart; 303 to `/post/{id}` |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Redirect},
};
use b04rd_core::{
  session::{Author, Session, normalize_display_name},
  thread::Thread,
};
use b04rd_engine::NewThread;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
  AppState, Backend,
  error::ApiError,
  form::ThreadForm,
  session::{CurrentSession, RequestCancel},
  views::ThreadView,
};

/// Attach lifecycle state and author to each thread.
async fn render<K: Backend>(
  state: &AppState<K>,
  threads: Vec<Thread>,
  cancel: &CancellationToken,
) -> Result<Vec<ThreadView>, ApiError> {
  let owners: Vec<Uuid> = threads.iter().map(|t| t.session_id).collect();
  let authors = state.board.identity.authors(owners, cancel).await?;

  Ok(
    threads
      .into_iter()
      .map(|t| {
        let author = authors.get(&t.session_id).cloned().unwrap_or_else(Author::anonymous);
        let lifecycle = state.board.threads.state_of(&t);
        ThreadView::new(t, lifecycle, author)
      })
      .collect(),
  )
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /api/threads`
pub async fn list_active<K: Backend>(
  State(state): State<AppState<K>>,
  RequestCancel(cancel): RequestCancel,
) -> Result<Json<Vec<ThreadView>>, ApiError> {
  let threads = state.board.threads.list_active(&cancel).await?;
  Ok(Json(render(&state, threads, &cancel).await?))
}

/// `GET /api/threads/all`
pub async fn list_all<K: Backend>(
  State(state): State<AppState<K>>,
  RequestCancel(cancel): RequestCancel,
) -> Result<Json<Vec<ThreadView>>, ApiError> {
  let threads = state.board.threads.list_all(&cancel).await?;
  Ok(Json(render(&state, threads, &cancel).await?))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /api/threads/{id}`
pub async fn get_one<K: Backend>(
  State(state): State<AppState<K>>,
  RequestCancel(cancel): RequestCancel,
  Path(id): Path<Uuid>,
) -> Result<Json<ThreadView>, ApiError> {
  let thread = state.board.threads.get(id, &cancel).await?;
  let mut views = render(&state, vec![thread], &cancel).await?;
  views
    .pop()
    .map(Json)
    .ok_or_else(|| ApiError::Internal("rendered thread went missing".into()))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// Create the thread and apply the optional display-name change. The name is
/// validated before anything is uploaded and stored only once the thread
/// exists.
async fn submit<K: Backend>(
  state: &AppState<K>,
  mut session: Session,
  form: ThreadForm,
  cancel: &CancellationToken,
) -> Result<(Thread, Session), ApiError> {
  let name = form.name.as_deref().map(normalize_display_name).transpose()?;

  let thread = state
    .board
    .threads
    .create(
      NewThread {
        title:       form.title,
        content:     form.content,
        attachments: form.files,
        session_id:  session.session_id,
      },
      cancel,
    )
    .await?;

  if let Some(name) = name {
    session.display_name = state
      .board
      .identity
      .update_display_name(session.session_id, &name, cancel)
      .await?;
  }
  Ok((thread, session))
}

/// `POST /api/threads`
pub async fn create<K: Backend>(
  State(state): State<AppState<K>>,
  CurrentSession(session): CurrentSession,
  RequestCancel(cancel): RequestCancel,
  form: ThreadForm,
) -> Result<impl IntoResponse, ApiError> {
  let (thread, session) = submit(&state, session, form, &cancel).await?;
  let lifecycle = state.board.threads.state_of(&thread);
  Ok((StatusCode::CREATED, Json(ThreadView::new(thread, lifecycle, session.author()))))
}

/// `POST /submit-post`
pub async fn submit_post<K: Backend>(
  State(state): State<AppState<K>>,
  CurrentSession(session): CurrentSession,
  RequestCancel(cancel): RequestCancel,
  form: ThreadForm,
) -> Result<Redirect, ApiError> {
  let (thread, _) = submit(&state, session, form, &cancel).await?;
  Ok(Redirect::to(&format!("/post/{}", thread.thread_id)))
}
