//! Content-addressable blob store collaborator.
//!
//! The coordinator lists every key held locally and reads code blobs as a
//! byte stream with known length, authorized against the caller's identity.

mod memory;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::BlobStoreError;

pub use memory::MemoryBlobStore;

/// Identity of the caller a blob read is authorized against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subject {
    pub principal: String,
}

impl Subject {
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.principal)
    }
}

/// Blob content as a stream with its length.
pub struct BlobStream {
    len: u64,
    reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl BlobStream {
    pub fn new(len: u64, reader: Box<dyn AsyncRead + Send + Unpin>) -> Self {
        Self { len, reader }
    }

    pub fn from_bytes(data: Bytes) -> Self {
        Self::new(data.len() as u64, Box::new(std::io::Cursor::new(data)))
    }

    /// Declared content length.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read exactly the declared length.
    ///
    /// A stream shorter than its declared length is an `UnexpectedEof`. The
    /// buffer grows with the bytes actually read, not the declared length.
    pub async fn read_fully(mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        (&mut self.reader).take(self.len).read_to_end(&mut buf).await?;
        if (buf.len() as u64) < self.len {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("blob ended after {} of {} bytes", buf.len(), self.len),
            ));
        }
        Ok(buf)
    }
}

impl fmt::Debug for BlobStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobStream").field("len", &self.len).finish()
    }
}

/// Blob store operations the coordinator consumes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Every key physically present in this replica's store.
    async fn list_keys(&self) -> Result<Vec<String>, BlobStoreError>;

    /// Open a blob for reading.
    async fn get_blob(&self, key: &str, subject: &Subject) -> Result<BlobStream, BlobStoreError>;
}
