//! Attachment upload pipeline.
//!
//! Fans a batch of files out to the Blob Store, one task per file, and
//! reports either every URL or a single aggregated failure. Object keys are
//! generated here; client file names never reach the Blob Store.
//!
//! Workers are detached. When the batch times out or the caller cancels,
//! in-flight uploads keep running and their results are dropped. Objects
//! that did land before a sibling failed are not deleted.

use std::{
  collections::{BTreeMap, HashSet},
  sync::Arc,
  time::Duration,
};

use b04rd_core::{Error, Result, remote::BlobStore};
use bytes::Bytes;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cancel::ensure_live;

/// Overall bound on one [`UploadPipeline::upload_all`] batch.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(15);

/// One file submitted with a thread or comment.
#[derive(Debug, Clone)]
pub struct Attachment {
  /// Client-side name; only used to key the result map.
  pub name:         String,
  /// Declared MIME type.
  pub content_type: String,
  pub data:         Bytes,
}

/// File extension for a declared content type, including the dot.
/// Unknown types get no extension.
pub fn extension_for(content_type: &str) -> &'static str {
  let essence = content_type
    .split(';')
    .next()
    .unwrap_or_default()
    .trim()
    .to_ascii_lowercase();
  match essence.as_str() {
    "image/jpeg" | "image/jpg" | "image/pjpeg" => ".jpg",
    "image/png" => ".png",
    "image/gif" => ".gif",
    "image/webp" => ".webp",
    _ => "",
  }
}

/// A fresh, unguessable object key for a file of `content_type`.
pub fn object_key(content_type: &str) -> String {
  format!("{}{}", Uuid::new_v4(), extension_for(content_type))
}

type Outcomes = BTreeMap<String, std::result::Result<String, String>>;

pub struct UploadPipeline<B> {
  blobs:   Arc<B>,
  timeout: Duration,
}

impl<B> UploadPipeline<B>
where
  B: BlobStore + 'static,
{
  pub fn new(blobs: Arc<B>) -> Self {
    Self { blobs, timeout: DEFAULT_UPLOAD_TIMEOUT }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Upload every file concurrently and map each name to its URL.
  ///
  /// Either every name is present in the result or an error is returned;
  /// callers never see a partial map.
  pub async fn upload_all(
    &self,
    files: Vec<Attachment>,
    cancel: &CancellationToken,
  ) -> Result<BTreeMap<String, String>> {
    if files.is_empty() {
      return Ok(BTreeMap::new());
    }

    let mut names = HashSet::with_capacity(files.len());
    for file in &files {
      if !names.insert(file.name.as_str()) {
        return Err(Error::DuplicateAttachment(file.name.clone()));
      }
    }
    ensure_live(cancel)?;

    let total = files.len();
    let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
    let outcomes: Arc<Mutex<Outcomes>> = Arc::new(Mutex::new(BTreeMap::new()));

    let workers: Vec<_> = files
      .into_iter()
      .map(|file| {
        let blobs = Arc::clone(&self.blobs);
        let outcomes = Arc::clone(&outcomes);
        let key = object_key(&file.content_type);
        tokio::spawn(async move {
          let outcome = blobs
            .put_object(key, file.content_type, file.data)
            .await
            .map_err(|e| e.to_string());
          outcomes.lock().await.insert(file.name, outcome);
        })
      })
      .collect();

    let all_done = async {
      for worker in workers {
        if let Err(err) = worker.await {
          tracing::error!(%err, "upload worker panicked");
        }
      }
    };

    tokio::select! {
      biased;
      _ = cancel.cancelled() => return Err(Error::Cancelled),
      finished = tokio::time::timeout(self.timeout, all_done) => {
        if finished.is_err() {
          tracing::warn!(total, timeout = ?self.timeout, "attachment upload timed out");
          return Err(Error::UploadTimeout(self.timeout));
        }
      }
    }

    let mut outcomes = std::mem::take(&mut *outcomes.lock().await);
    let mut urls = BTreeMap::new();
    let mut failures = Vec::new();
    for name in names {
      match outcomes.remove(&name) {
        Some(Ok(url)) => {
          urls.insert(name, url);
        }
        Some(Err(err)) => failures.push(format!("{name}: {err}")),
        None => failures.push(format!("{name}: upload did not complete")),
      }
    }

    if !failures.is_empty() {
      let failed = failures.len();
      tracing::warn!(failed, total, "attachment upload failed");
      return Err(Error::Upload { failed, total, detail: failures.join("; ") });
    }

    tracing::debug!(total, "attachments uploaded");
    Ok(urls)
  }
}
