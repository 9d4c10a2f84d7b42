//! Identity cookie, the session-resolving middleware and the extractors it
//! feeds.
//!
//! Every request passes through [`resolve_session`], which resolves the
//! cookie to a live session, attaches it (and a per-request cancellation
//! token) to the request, and reissues the cookie when a new session was
//! minted.

use axum::{
  extract::{FromRequestParts, Request, State},
  http::{HeaderMap, HeaderValue, header, request::Parts},
  middleware::Next,
  response::{IntoResponse, Response},
};
use b04rd_core::session::Session;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::{AppState, Backend, error::ApiError};

/// Default name of the identity cookie.
pub const DEFAULT_COOKIE_NAME: &str = "1337session";

// ─── Cookie ──────────────────────────────────────────────────────────────────

/// Value of the cookie `name` in the request's `Cookie` header(s), if set and
/// non-empty.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
  headers
    .get_all(header::COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|raw| raw.split(';'))
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(key, _)| key.trim() == name)
    .map(|(_, value)| value.trim().trim_matches('"').to_owned())
    .filter(|value| !value.is_empty())
}

/// `Expires` attribute format (IMF-fixdate).
fn http_date(at: DateTime<Utc>) -> String {
  at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// `Set-Cookie` value carrying `session`'s id until it expires.
pub fn session_cookie(name: &str, session: &Session) -> String {
  format!(
    "{name}={}; Path=/; HttpOnly; SameSite=Lax; Expires={}",
    session.session_id.hyphenated(),
    http_date(session.expires_at),
  )
}

// ─── Middleware ──────────────────────────────────────────────────────────────

/// Resolve the identity cookie to a live session for the rest of the stack.
pub async fn resolve_session<K: Backend>(
  State(state): State<AppState<K>>,
  mut req: Request,
  next: Next,
) -> Response {
  // Fires if this future is dropped before the response is produced.
  let cancel = CancellationToken::new();
  let guard = cancel.clone().drop_guard();

  let token = cookie_value(req.headers(), &state.config.cookie_name).unwrap_or_default();
  let resolution = match state.board.identity.resolve(&token, &cancel).await {
    Ok(resolution) => resolution,
    Err(err) => {
      guard.disarm();
      return ApiError::from(err).into_response();
    }
  };

  req.extensions_mut().insert(CurrentSession(resolution.session.clone()));
  req.extensions_mut().insert(RequestCancel(cancel));

  let mut response = next.run(req).await;
  guard.disarm();

  if resolution.fresh {
    let cookie = session_cookie(&state.config.cookie_name, &resolution.session);
    match HeaderValue::from_str(&cookie) {
      Ok(value) => {
        response.headers_mut().append(header::SET_COOKIE, value);
      }
      Err(err) => tracing::error!(%err, "session cookie is not a valid header value"),
    }
  }
  response
}

// ─── Extractors ──────────────────────────────────────────────────────────────

/// The live session of the current request.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

impl<S: Send + Sync> FromRequestParts<S> for CurrentSession {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<CurrentSession>()
      .cloned()
      .ok_or_else(|| ApiError::Internal("session middleware is not installed".into()))
  }
}

/// Cancelled when the client goes away before the response is ready.
#[derive(Debug, Clone)]
pub struct RequestCancel(pub CancellationToken);

impl<S: Send + Sync> FromRequestParts<S> for RequestCancel {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<RequestCancel>()
      .cloned()
      .ok_or_else(|| ApiError::Internal("session middleware is not installed".into()))
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use uuid::Uuid;

  use super::*;

  #[test]
  fn finds_the_named_cookie_among_others() {
    let mut headers = HeaderMap::new();
    headers.insert(
      header::COOKIE,
      HeaderValue::from_static("theme=dark; 1337session=abc-123 ; other=x"),
    );
    assert_eq!(cookie_value(&headers, "1337session").as_deref(), Some("abc-123"));
    assert_eq!(cookie_value(&headers, "missing"), None);
  }

  #[test]
  fn empty_cookie_counts_as_absent() {
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, HeaderValue::from_static("1337session="));
    assert_eq!(cookie_value(&headers, "1337session"), None);
  }

  #[test]
  fn cookie_carries_attributes_and_imf_expiry() {
    let created = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    let session = Session {
      session_id:   Uuid::nil(),
      avatar_url:   "https://avatars.test/1.jpeg".into(),
      display_name: "Summer".into(),
      created_at:   created,
      expires_at:   Utc.with_ymd_and_hms(2026, 1, 8, 12, 0, 0).unwrap(),
    };

    let cookie = session_cookie("1337session", &session);
    assert_eq!(
      cookie,
      "1337session=00000000-0000-0000-0000-000000000000; Path=/; HttpOnly; \
       SameSite=Lax; Expires=Thu, 08 Jan 2026 12:00:00 GMT"
    );
  }
}
