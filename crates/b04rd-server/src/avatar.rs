//! Avatar Source backed by a Rick and Morty style character API.
//!
//! `GET {base}/character` reports how many characters exist; one is then
//! picked uniformly at random and fetched from `GET {base}/character/{id}`.

use std::time::Duration;

use b04rd_core::remote::{Avatar, AvatarSource};
use rand_core::{OsRng, RngCore};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};

use crate::error::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct CharacterList {
  info: ListInfo,
}

#[derive(Deserialize)]
struct ListInfo {
  count: u64,
}

#[derive(Deserialize)]
struct Character {
  #[serde(default)]
  name:  String,
  #[serde(default)]
  image: String,
}

#[derive(Clone)]
pub struct HttpAvatarSource {
  client:   Client,
  base_url: String,
}

impl HttpAvatarSource {
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    Ok(Self { client, base_url: base_url.into() })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/{path}", self.base_url.trim_end_matches('/'))
  }

  async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
    let resp = self.client.get(&url).send().await?;
    if !resp.status().is_success() {
      return Err(Error::Status { url, status: resp.status() });
    }
    Ok(resp.json().await?)
  }
}

/// A character id in `1..=count`.
fn pick(count: u64) -> Result<u64> {
  if count == 0 {
    return Err(Error::NoCharacters);
  }
  Ok(OsRng.next_u64() % count + 1)
}

impl AvatarSource for HttpAvatarSource {
  type Error = Error;

  async fn random_avatar(&self) -> Result<Avatar> {
    let list: CharacterList = self.get_json(self.url("character")).await?;
    let id = pick(list.info.count)?;

    let character: Character = self.get_json(self.url(&format!("character/{id}"))).await?;
    if character.name.is_empty() || character.image.is_empty() {
      return Err(Error::IncompleteCharacter(id));
    }

    tracing::debug!(id, name = %character.name, "picked avatar");
    Ok(Avatar { image_url: character.image, display_name: character.name })
  }
}
