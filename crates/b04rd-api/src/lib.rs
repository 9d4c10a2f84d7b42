//! HTTP surface for b04rd.
//!
//! Exposes an axum [`Router`] over a [`Board`]. Every route runs behind the
//! session middleware, so handlers can take [`session::CurrentSession`] and
//! [`session::RequestCancel`] as extractors. Reads are JSON; the
//! `/submit-*` routes redirect to `/post/{id}` for form posts.

pub mod comments;
pub mod error;
pub mod form;
pub mod session;
pub mod sessions;
pub mod threads;
pub mod views;

use std::sync::Arc;

use axum::{
  Router,
  extract::DefaultBodyLimit,
  middleware,
  routing::{get, post},
};
use b04rd_core::{
  remote::{AvatarSource, BlobStore},
  store::{CommentStore, SessionStore, ThreadStore},
};
use b04rd_engine::Board;

pub use error::ApiError;

/// Default cap on a request body, multipart uploads included.
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

// ─── Backend ─────────────────────────────────────────────────────────────────

/// The concrete collaborators a deployment plugs into the [`Board`].
pub trait Backend: Send + Sync + 'static {
  type Store: SessionStore + ThreadStore + CommentStore + 'static;
  type Avatars: AvatarSource + 'static;
  type Blobs: BlobStore + 'static;
}

pub type BoardOf<K> =
  Board<<K as Backend>::Store, <K as Backend>::Avatars, <K as Backend>::Blobs>;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub cookie_name:    String,
  pub max_body_bytes: usize,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      cookie_name:    session::DEFAULT_COOKIE_NAME.to_owned(),
      max_body_bytes: DEFAULT_MAX_BODY_BYTES,
    }
  }
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<K: Backend> {
  pub board:  Arc<BoardOf<K>>,
  pub config: Arc<ApiConfig>,
}

impl<K: Backend> AppState<K> {
  pub fn new(board: Arc<BoardOf<K>>, config: ApiConfig) -> Self {
    Self { board, config: Arc::new(config) }
  }
}

impl<K: Backend> Clone for AppState<K> {
  fn clone(&self) -> Self {
    Self {
      board:  Arc::clone(&self.board),
      config: Arc::clone(&self.config),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full b04rd router.
pub fn router<K: Backend>(state: AppState<K>) -> Router {
  Router::new()
    // Sessions
    .route("/api/session/me", get(sessions::me))
    .route("/api/session/name", post(sessions::rename::<K>))
    .route("/api/session/list", get(sessions::list::<K>))
    // Threads
    .route("/api/threads", get(threads::list_active::<K>).post(threads::create::<K>))
    .route("/api/threads/all", get(threads::list_all::<K>))
    .route("/api/threads/{id}", get(threads::get_one::<K>))
    // Comments
    .route(
      "/api/threads/{id}/comments",
      get(comments::list::<K>).post(comments::create::<K>),
    )
    // Form posts
    .route("/submit-post", post(threads::submit_post::<K>))
    .route("/submit-comment", post(comments::submit_comment::<K>))
    .layer(middleware::from_fn_with_state(
      state.clone(),
      session::resolve_session::<K>,
    ))
    .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
    .with_state(state)
}

// ─── Integration tests ───────────────────────────────────────────────────────
