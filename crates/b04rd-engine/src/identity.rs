//! Identity & session manager.
//!
//! Turns whatever token a visitor presents into a live [`Session`]. Lookup
//! failures of any kind are absorbed by minting a fresh session; only a
//! failure to mint one (Avatar Source down, store down) reaches the caller.

use std::{collections::HashMap, sync::Arc};

use b04rd_core::{
  Error, Result,
  clock::Clock,
  remote::AvatarSource,
  session::{Author, Session, normalize_display_name},
  store::SessionStore,
};
use chrono::TimeDelta;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cancel::interruptible;

/// Default session lifetime, in days.
pub const DEFAULT_SESSION_TTL_DAYS: i64 = 7;

/// Outcome of [`IdentityManager::resolve`].
#[derive(Debug, Clone)]
pub struct Resolution {
  pub session: Session,
  /// `true` when the session was minted by this call and the caller must
  /// hand its id back to the client.
  pub fresh:   bool,
}

pub struct IdentityManager<S, A> {
  store:   Arc<S>,
  avatars: Arc<A>,
  clock:   Arc<dyn Clock>,
  ttl:     TimeDelta,
}

impl<S, A> IdentityManager<S, A>
where
  S: SessionStore,
  A: AvatarSource,
{
  /// `ttl` must be positive; a non-positive value falls back to
  /// [`DEFAULT_SESSION_TTL_DAYS`].
  pub fn new(
    store: Arc<S>,
    avatars: Arc<A>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
  ) -> Self {
    let ttl = if ttl > TimeDelta::zero() {
      ttl
    } else {
      TimeDelta::days(DEFAULT_SESSION_TTL_DAYS)
    };
    Self { store, avatars, clock, ttl }
  }

  pub fn ttl(&self) -> TimeDelta { self.ttl }

  /// Resolve `token` to a live session, minting one when the token is empty,
  /// malformed, unknown, expired, or cannot be looked up.
  pub async fn resolve(
    &self,
    token: &str,
    cancel: &CancellationToken,
  ) -> Result<Resolution> {
    let token = token.trim();
    if token.is_empty() {
      return self.mint(cancel).await;
    }

    let id = match Uuid::parse_str(token) {
      Ok(id) => id,
      Err(err) => {
        tracing::debug!(%err, "unparseable session token");
        return self.mint(cancel).await;
      }
    };

    let lookup = interruptible(cancel, async {
      self.store.get_session(id).await.map_err(Error::storage)
    })
    .await;

    match lookup {
      Ok(Some(session)) if session.is_live(self.clock.now()) => {
        Ok(Resolution { session, fresh: false })
      }
      Ok(Some(_)) => {
        tracing::debug!(session_id = %id, "session expired");
        self.mint(cancel).await
      }
      Ok(None) => {
        tracing::debug!(session_id = %id, "session not found");
        self.mint(cancel).await
      }
      Err(Error::Cancelled) => Err(Error::Cancelled),
      Err(err) => {
        tracing::warn!(session_id = %id, %err, "session lookup failed, issuing a new identity");
        self.mint(cancel).await
      }
    }
  }

  async fn mint(&self, cancel: &CancellationToken) -> Result<Resolution> {
    let session = self.create_session(cancel).await?;
    Ok(Resolution { session, fresh: true })
  }

  /// Mint and persist a new session with a random avatar.
  ///
  /// The Avatar Source is asked exactly once; its failure is reported as
  /// [`Error::AvatarAssignment`].
  pub async fn create_session(&self, cancel: &CancellationToken) -> Result<Session> {
    let avatar = interruptible(cancel, async {
      self.avatars.random_avatar().await.map_err(Error::avatar)
    })
    .await?;

    let now = self.clock.now();
    let session = Session {
      session_id:   Uuid::new_v4(),
      avatar_url:   avatar.image_url,
      display_name: avatar.display_name,
      created_at:   now,
      expires_at:   now + self.ttl,
    };

    interruptible(cancel, async {
      self
        .store
        .insert_session(session.clone())
        .await
        .map_err(Error::storage)
    })
    .await?;

    tracing::info!(
      session_id = %session.session_id,
      display_name = %session.display_name,
      "session created",
    );
    Ok(session)
  }

  /// Change the display name of an existing session. Returns the stored
  /// (trimmed) name.
  pub async fn update_display_name(
    &self,
    session_id: Uuid,
    name: &str,
    cancel: &CancellationToken,
  ) -> Result<String> {
    if session_id.is_nil() {
      return Err(Error::MissingSession);
    }
    let name = normalize_display_name(name)?;

    let renamed = interruptible(cancel, async {
      self
        .store
        .rename_session(session_id, name.clone())
        .await
        .map_err(Error::storage)
    })
    .await?;

    if !renamed {
      return Err(Error::SessionNotFound(session_id));
    }
    tracing::info!(%session_id, display_name = %name, "display name updated");
    Ok(name)
  }

  /// Every session that is still live, whether or not expired rows have been
  /// purged yet.
  pub async fn list_live_sessions(
    &self,
    cancel: &CancellationToken,
  ) -> Result<Vec<Session>> {
    let sessions = interruptible(cancel, async {
      self.store.list_sessions().await.map_err(Error::storage)
    })
    .await?;

    let now = self.clock.now();
    Ok(sessions.into_iter().filter(|s| s.is_live(now)).collect())
  }

  /// Delete every session whose expiry has passed.
  pub async fn purge_expired(&self, cancel: &CancellationToken) -> Result<u64> {
    let now = self.clock.now();
    let purged = interruptible(cancel, async {
      self
        .store
        .delete_expired_sessions(now)
        .await
        .map_err(Error::storage)
    })
    .await?;

    if purged > 0 {
      tracing::info!(purged, "expired sessions purged");
    }
    Ok(purged)
  }

  /// The author to display for content owned by `session_id`. Gone or
  /// expired sessions render as [`Author::anonymous`].
  pub async fn author(
    &self,
    session_id: Uuid,
    cancel: &CancellationToken,
  ) -> Result<Author> {
    let session = interruptible(cancel, async {
      self.store.get_session(session_id).await.map_err(Error::storage)
    })
    .await?;

    let now = self.clock.now();
    Ok(match session {
      Some(s) if s.is_live(now) => s.author(),
      _ => Author::anonymous(),
    })
  }

  /// [`Self::author`] for a batch of owners, looking each one up once.
  pub async fn authors<I>(
    &self,
    session_ids: I,
    cancel: &CancellationToken,
  ) -> Result<HashMap<Uuid, Author>>
  where
    I: IntoIterator<Item = Uuid>,
  {
    let mut authors = HashMap::new();
    for id in session_ids {
      if authors.contains_key(&id) {
        continue;
      }
      let author = self.author(id, cancel).await?;
      authors.insert(id, author);
    }
    Ok(authors)
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use b04rd_core::{ErrorKind, clock::ManualClock, session::ANONYMOUS};
  use b04rd_store_sqlite::SqliteStore;

  use super::*;
  use crate::testing::{FailingAvatars, FakeAvatars, RiggedStore, t0};

  fn ttl() -> TimeDelta { TimeDelta::days(DEFAULT_SESSION_TTL_DAYS) }

  async fn manager(
    clock: &ManualClock,
  ) -> IdentityManager<SqliteStore, FakeAvatars> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    IdentityManager::new(
      Arc::new(store),
      Arc::new(FakeAvatars::default()),
      Arc::new(clock.clone()),
      ttl(),
    )
  }

  #[tokio::test]
  async fn empty_token_mints_a_fresh_live_session() {
    let clock = ManualClock::new(t0());
    let ids = manager(&clock).await;
    let cancel = CancellationToken::new();

    let res = ids.resolve("", &cancel).await.unwrap();
    assert!(res.fresh);
    assert!(res.session.is_live(clock.now()));
    assert_eq!(res.session.expires_at, res.session.created_at + ttl());
  }

  #[tokio::test]
  async fn known_live_token_is_reused() {
    let clock = ManualClock::new(t0());
    let ids = manager(&clock).await;
    let cancel = CancellationToken::new();

    let first = ids.resolve("", &cancel).await.unwrap().session;
    let again = ids
      .resolve(&first.session_id.to_string(), &cancel)
      .await
      .unwrap();
    assert!(!again.fresh);
    assert_eq!(again.session, first);
  }

  #[tokio::test]
  async fn garbage_and_unknown_tokens_self_heal() {
    let clock = ManualClock::new(t0());
    let ids = manager(&clock).await;
    let cancel = CancellationToken::new();

    let tokens = [
      "not-a-uuid".to_string(),
      Uuid::new_v4().to_string(),
      Uuid::nil().to_string(),
    ];
    for token in &tokens {
      let res = ids.resolve(token, &cancel).await.unwrap();
      assert!(res.fresh, "token {token:?} should mint a session");
      assert!(res.session.is_live(clock.now()));
    }
  }

  #[tokio::test]
  async fn expired_token_is_replaced() {
    let clock = ManualClock::new(t0());
    let ids = manager(&clock).await;
    let cancel = CancellationToken::new();

    let old = ids.resolve("", &cancel).await.unwrap().session;
    clock.advance(ttl());

    let res = ids.resolve(&old.session_id.to_string(), &cancel).await.unwrap();
    assert!(res.fresh);
    assert_ne!(res.session.session_id, old.session_id);
    assert!(res.session.is_live(clock.now()));
  }

  #[tokio::test]
  async fn resolving_empty_tokens_never_repeats_an_id() {
    let clock = ManualClock::new(t0());
    let ids = manager(&clock).await;
    let cancel = CancellationToken::new();

    let mut seen = HashSet::new();
    for _ in 0..10_000 {
      let res = ids.resolve("", &cancel).await.unwrap();
      assert!(seen.insert(res.session.session_id));
    }
    assert_eq!(seen.len(), 10_000);
  }

  #[tokio::test]
  async fn avatar_failure_is_an_upstream_error() {
    let clock = ManualClock::new(t0());
    let store = SqliteStore::open_in_memory().await.unwrap();
    let ids = IdentityManager::new(
      Arc::new(store),
      Arc::new(FailingAvatars),
      Arc::new(clock),
      ttl(),
    );

    let err = ids.resolve("", &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::AvatarAssignment(_)));
    assert_eq!(err.kind(), ErrorKind::Upstream);
  }

  #[tokio::test]
  async fn lookup_failure_issues_a_new_identity() {
    let clock = ManualClock::new(t0());
    let store = Arc::new(RiggedStore::new().await);
    let ids = IdentityManager::new(
      Arc::clone(&store),
      Arc::new(FakeAvatars::default()),
      Arc::new(clock.clone()),
      ttl(),
    );
    let cancel = CancellationToken::new();

    let known = ids.resolve("", &cancel).await.unwrap().session;
    store.break_session_lookups();

    let res = ids.resolve(&known.session_id.to_string(), &cancel).await.unwrap();
    assert!(res.fresh);
    assert_ne!(res.session.session_id, known.session_id);
    assert!(res.session.is_live(clock.now()));
  }

  #[tokio::test]
  async fn cancelled_resolution_persists_nothing() {
    let clock = ManualClock::new(t0());
    let ids = manager(&clock).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = ids.resolve("", &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));

    let live = ids.list_live_sessions(&CancellationToken::new()).await.unwrap();
    assert!(live.is_empty());
  }

  #[tokio::test]
  async fn display_name_updates_are_validated() {
    let clock = ManualClock::new(t0());
    let ids = manager(&clock).await;
    let cancel = CancellationToken::new();
    let s = ids.resolve("", &cancel).await.unwrap().session;

    let name = ids
      .update_display_name(s.session_id, "  Mr. Poopybutthole ", &cancel)
      .await
      .unwrap();
    assert_eq!(name, "Mr. Poopybutthole");
    assert_eq!(ids.author(s.session_id, &cancel).await.unwrap().display_name, name);

    assert!(matches!(
      ids.update_display_name(s.session_id, "   ", &cancel).await,
      Err(Error::EmptyDisplayName)
    ));
    assert!(matches!(
      ids.update_display_name(Uuid::new_v4(), "Jerry", &cancel).await,
      Err(Error::SessionNotFound(_))
    ));
  }

  #[tokio::test]
  async fn listing_hides_expired_sessions_and_purge_removes_them() {
    let clock = ManualClock::new(t0());
    let ids = manager(&clock).await;
    let cancel = CancellationToken::new();

    let old = ids.resolve("", &cancel).await.unwrap().session;
    clock.advance(ttl() - TimeDelta::hours(1));
    let young = ids.resolve("", &cancel).await.unwrap().session;
    clock.advance(TimeDelta::hours(2));

    let live = ids.list_live_sessions(&cancel).await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].session_id, young.session_id);

    assert_eq!(ids.purge_expired(&cancel).await.unwrap(), 1);
    let author = ids.author(old.session_id, &cancel).await.unwrap();
    assert_eq!(author.display_name, ANONYMOUS);
  }

  #[tokio::test]
  async fn authors_fall_back_to_anonymous() {
    let clock = ManualClock::new(t0());
    let ids = manager(&clock).await;
    let cancel = CancellationToken::new();
    let s = ids.resolve("", &cancel).await.unwrap().session;
    let ghost = Uuid::new_v4();

    let authors = ids
      .authors([s.session_id, ghost, s.session_id], &cancel)
      .await
      .unwrap();
    assert_eq!(authors.len(), 2);
    assert_eq!(authors[&s.session_id], s.author());
    assert_eq!(authors[&ghost], Author::anonymous());
  }
}
