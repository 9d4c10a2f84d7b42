//! Production wiring for b04rd: configuration and the HTTP adapters for the
//! Avatar Source and the Blob Store.

pub mod avatar;
pub mod blob;
pub mod error;

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use b04rd_api::{ApiConfig, Backend, DEFAULT_MAX_BODY_BYTES, session::DEFAULT_COOKIE_NAME};
use b04rd_core::lifecycle::LifecyclePolicy;
use b04rd_engine::{BoardConfig, identity::DEFAULT_SESSION_TTL_DAYS, sweeper};
use b04rd_store_sqlite::SqliteStore;
use chrono::TimeDelta;
use serde::Deserialize;

pub use avatar::HttpAvatarSource;
pub use blob::{Credentials, HttpBlobStore};
pub use error::Error;

/// Environment variables with this prefix override the config file, e.g.
/// `B04RD_PORT=9000`.
pub const ENV_PREFIX: &str = "B04RD";

// ─── Backend ─────────────────────────────────────────────────────────────────

/// SQLite persistence with HTTP remotes.
pub struct LiveBackend;

impl Backend for LiveBackend {
  type Store = SqliteStore;
  type Avatars = HttpAvatarSource;
  type Blobs = HttpBlobStore;
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and the
/// environment. Every key is optional.
#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                 String,
  pub port:                 u16,
  pub database_path:        PathBuf,
  pub blob_endpoint:        String,
  pub blob_access_key:      String,
  pub blob_secret_key:      String,
  pub blob_bucket_threads:  String,
  pub blob_bucket_comments: String,
  pub blob_use_ssl:         bool,
  pub avatar_base_url:      String,
  pub session_cookie_name:  String,
  pub session_ttl_days:     i64,
  pub sweep_interval_secs:  u64,
  pub upload_timeout_secs:  u64,
  pub uncommented_ttl_secs: i64,
  pub commented_ttl_secs:   i64,
  pub max_body_bytes:       usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    let policy = LifecyclePolicy::default();
    Self {
      host:                 "0.0.0.0".to_owned(),
      port:                 8080,
      database_path:        PathBuf::from("b04rd.db"),
      blob_endpoint:        "localhost:9000".to_owned(),
      blob_access_key:      String::new(),
      blob_secret_key:      String::new(),
      blob_bucket_threads:  "threads".to_owned(),
      blob_bucket_comments: "comments".to_owned(),
      blob_use_ssl:         false,
      avatar_base_url:      "https://rickandmortyapi.com/api".to_owned(),
      session_cookie_name:  DEFAULT_COOKIE_NAME.to_owned(),
      session_ttl_days:     DEFAULT_SESSION_TTL_DAYS,
      sweep_interval_secs:  sweeper::DEFAULT_SWEEP_INTERVAL.as_secs(),
      upload_timeout_secs:  b04rd_engine::upload::DEFAULT_UPLOAD_TIMEOUT.as_secs(),
      uncommented_ttl_secs: policy.uncommented_ttl.num_seconds(),
      commented_ttl_secs:   policy.commented_ttl.num_seconds(),
      max_body_bytes:       DEFAULT_MAX_BODY_BYTES,
    }
  }
}

impl ServerConfig {
  /// Read `path` if it exists, then apply `B04RD_*` overrides. Durations
  /// that are not positive or do not fit a [`TimeDelta`] are rejected here.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    let cfg: Self = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix(ENV_PREFIX))
      .build()?
      .try_deserialize()?;
    cfg.board_config()?;
    Ok(cfg)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn sweep_interval(&self) -> Duration {
    Duration::from_secs(self.sweep_interval_secs.max(1))
  }

  pub fn board_config(&self) -> Result<BoardConfig, config::ConfigError> {
    Ok(BoardConfig {
      session_ttl:    ttl("session_ttl_days", self.session_ttl_days, TimeDelta::try_days)?,
      policy:         LifecyclePolicy {
        uncommented_ttl: ttl(
          "uncommented_ttl_secs",
          self.uncommented_ttl_secs,
          TimeDelta::try_seconds,
        )?,
        commented_ttl:   ttl("commented_ttl_secs", self.commented_ttl_secs, TimeDelta::try_seconds)?,
      },
      upload_timeout: Duration::from_secs(self.upload_timeout_secs),
    })
  }

  pub fn api_config(&self) -> ApiConfig {
    ApiConfig {
      cookie_name:    self.session_cookie_name.clone(),
      max_body_bytes: self.max_body_bytes,
    }
  }

  pub fn blob_credentials(&self) -> Credentials {
    Credentials {
      access_key: self.blob_access_key.clone(),
      secret_key: self.blob_secret_key.clone(),
    }
  }
}

fn ttl(
  key: &str,
  value: i64,
  unit: fn(i64) -> Option<TimeDelta>,
) -> Result<TimeDelta, config::ConfigError> {
  unit(value)
    .filter(|d| *d > TimeDelta::zero())
    .ok_or_else(|| config::ConfigError::Message(format!("{key} = {value} is out of range")))
}
