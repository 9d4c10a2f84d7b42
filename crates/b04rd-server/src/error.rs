//! Errors raised by the HTTP adapters.

use reqwest::StatusCode;
use thiserror::Error;

/// Failures talking to the Avatar Source or the Blob Store.
#[derive(Debug, Error)]
pub enum Error {
  #[error("HTTP request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{url} answered {status}")]
  Status { url: String, status: StatusCode },

  #[error("avatar source lists no characters")]
  NoCharacters,

  #[error("character {0} has no name or image")]
  IncompleteCharacter(u64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
