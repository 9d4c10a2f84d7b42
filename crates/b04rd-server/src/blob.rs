//! Blob Store over an S3/MinIO style HTTP endpoint.
//!
//! Objects are written with a plain `PUT {endpoint}/{bucket}/{key}` under
//! basic auth, and are served back from the same URL.

use std::time::Duration;

use b04rd_core::remote::BlobStore;
use bytes::Bytes;
use reqwest::{Client, StatusCode, header};

use crate::error::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct Credentials {
  pub access_key: String,
  pub secret_key: String,
}

/// One bucket on one endpoint.
#[derive(Clone)]
pub struct HttpBlobStore {
  client:      Client,
  base_url:    String,
  bucket:      String,
  credentials: Credentials,
}

/// `endpoint` with a scheme. Bare `host:port` endpoints get `https://` when
/// `use_ssl` is set and `http://` otherwise.
fn base_url(endpoint: &str, use_ssl: bool) -> String {
  let endpoint = endpoint.trim_end_matches('/');
  if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
    endpoint.to_owned()
  } else if use_ssl {
    format!("https://{endpoint}")
  } else {
    format!("http://{endpoint}")
  }
}

impl HttpBlobStore {
  pub fn new(
    endpoint: &str,
    use_ssl: bool,
    bucket: impl Into<String>,
    credentials: Credentials,
  ) -> Result<Self> {
    let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    Ok(Self {
      client,
      base_url: base_url(endpoint, use_ssl),
      bucket: bucket.into(),
      credentials,
    })
  }

  fn bucket_url(&self) -> String { format!("{}/{}", self.base_url, self.bucket) }

  pub fn object_url(&self, key: &str) -> String { format!("{}/{key}", self.bucket_url()) }

  fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    req.basic_auth(&self.credentials.access_key, Some(&self.credentials.secret_key))
  }

  /// Check the bucket at startup. A missing bucket is only logged since it
  /// may be created out of band; any other non-200 answer is an error.
  pub async fn check_bucket(&self) -> Result<()> {
    let url = self.bucket_url();
    let resp = self.authed(self.client.head(&url)).send().await?;
    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
      tracing::warn!(bucket = %self.bucket, "bucket does not exist yet");
    } else if status != StatusCode::OK {
      return Err(Error::Status { url, status });
    }
    Ok(())
  }
}

impl BlobStore for HttpBlobStore {
  type Error = Error;

  async fn put_object(&self, key: String, content_type: String, data: Bytes) -> Result<String> {
    let url = self.object_url(&key);
    let size = data.len();
    let resp = self
      .authed(self.client.put(&url))
      .header(header::CONTENT_TYPE, content_type)
      .body(data)
      .send()
      .await?;

    if resp.status() != StatusCode::OK {
      tracing::error!(%url, status = %resp.status(), "blob store rejected upload");
      return Err(Error::Status { url, status: resp.status() });
    }
    tracing::info!(%url, size, "stored object");
    Ok(url)
  }
}
