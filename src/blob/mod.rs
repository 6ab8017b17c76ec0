//! Blob storage for file payloads.
//!
//! Payloads are addressed by the owning file's id. The metadata store is the
//! only authority on whether a file exists; a blob without a metadata row is
//! never served.

mod fs;

pub use fs::FsBlobStore;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::AsyncRead;

use crate::error::{Error, Result};

pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes the payload atomically; a partially written blob is never visible.
    async fn put(&self, id: &str, data: &[u8]) -> Result<()>;

    /// Opens the payload for streaming. `NotFound` if absent.
    async fn open(&self, id: &str) -> Result<(BlobReader, u64)>;

    async fn exists(&self, id: &str) -> Result<bool>;

    /// Removes the payload. Returns `false` if there was nothing to remove.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Moves the payload out of the served area so it can be restored or
    /// purged later. Returns `false` if there was no payload to move.
    async fn quarantine(&self, id: &str) -> Result<bool>;

    async fn restore(&self, id: &str) -> Result<()>;

    async fn purge(&self, id: &str) -> Result<()>;

    /// Ids of every payload currently parked in quarantine.
    async fn quarantined(&self) -> Result<Vec<String>>;
}

/// Lowercase hex sha256 of `data`.
#[must_use]
pub fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Runs a blob operation, retrying transient I/O failures with a short
/// linear backoff. Non-I/O errors are returned immediately.
pub async fn with_retry<T, F, Fut>(op: &str, id: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(Error::StorageIo(e)) if attempt < RETRY_ATTEMPTS => {
                tracing::warn!(
                    "Blob {} failed for {} (attempt {}/{}): {}",
                    op,
                    id,
                    attempt,
                    RETRY_ATTEMPTS,
                    e
                );
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
