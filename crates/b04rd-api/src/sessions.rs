//! Handlers for `/api/session` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/session/me` | The caller's session |
//! | `POST` | `/api/session/name` | Body: `{"name":"..."}` |
//! | `GET`  | `/api/session/list` | Live sessions, without ids |

use axum::{Json, extract::State};
use serde::Deserialize;

use crate::{
  AppState, Backend,
  error::ApiError,
  session::{CurrentSession, RequestCancel},
  views::{MeView, SessionView},
};

/// `GET /api/session/me`
pub async fn me(CurrentSession(session): CurrentSession) -> Json<MeView> {
  Json(session.into())
}

#[derive(Debug, Deserialize)]
pub struct RenameBody {
  pub name: String,
}

/// `POST /api/session/name`
pub async fn rename<K: Backend>(
  State(state): State<AppState<K>>,
  CurrentSession(mut session): CurrentSession,
  RequestCancel(cancel): RequestCancel,
  Json(body): Json<RenameBody>,
) -> Result<Json<MeView>, ApiError> {
  session.display_name = state
    .board
    .identity
    .update_display_name(session.session_id, &body.name, &cancel)
    .await?;
  Ok(Json(session.into()))
}

/// `GET /api/session/list`
pub async fn list<K: Backend>(
  State(state): State<AppState<K>>,
  RequestCancel(cancel): RequestCancel,
) -> Result<Json<Vec<SessionView>>, ApiError> {
  let sessions = state.board.identity.list_live_sessions(&cancel).await?;
  Ok(Json(sessions.into_iter().map(SessionView::from).collect()))
}
