//! Remote collaborators: the Avatar Source and the Blob Store.
//!
//! Both are unreliable network services. The engine treats every error they
//! return as an upstream failure and never retries on its own.

use std::future::Future;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A randomly chosen display identity for a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Avatar {
  pub image_url:    String,
  pub display_name: String,
}

pub trait AvatarSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn random_avatar(
    &self,
  ) -> impl Future<Output = Result<Avatar, Self::Error>> + Send + '_;
}

/// Object storage for attachment files.
pub trait BlobStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store `data` under `key` and return a URL it can be fetched from.
  ///
  /// Keys are always generated server-side; implementations may assume they
  /// are safe path segments.
  fn put_object(
    &self,
    key: String,
    content_type: String,
    data: Bytes,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;
}
