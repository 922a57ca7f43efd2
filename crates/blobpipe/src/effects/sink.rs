//! Destination side of a copy.

use std::error::Error as StdError;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use blobpipe_verify::{Digest, DigestAlgorithm, Hasher};
use thiserror::Error;
use tracing::debug;

use crate::data::{BlobInfo, LayerCompression, UploadedBlob};
use crate::effects::cache::BlobInfoCache;

/// Per-call context handed to [`BlobSink::put_blob`].
#[derive(Clone)]
pub struct PutBlobOptions {
    pub cache:       Arc<dyn BlobInfoCache>,
    pub is_config:   bool,
    /// Position of the layer in the image; `None` for config blobs.
    pub layer_index: Option<usize>,
    pub empty_layer: bool,
}

/// Where copied blobs are stored.
pub trait BlobSink {
    type Error: StdError + Send + Sync + 'static;

    /// Compression the destination would like layers stored with.
    fn desired_layer_compression(&self) -> LayerCompression { LayerCompression::PreserveOriginal }

    /// Store the bytes of `reader`, described by `info`.
    ///
    /// The sink may stop reading early when it already has the blob.
    /// `info.digest`, when set, is the digest the stored bytes must have;
    /// the returned digest is the one the sink computed or already knew.
    fn put_blob(
        &self,
        reader: &mut dyn Read,
        info: &BlobInfo,
        options: PutBlobOptions,
    ) -> Result<UploadedBlob, Self::Error>;
}

#[derive(Debug, Error)]
pub enum FileSinkError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("persisting blob: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("stored bytes have digest {actual}, expected {expected}")]
    DigestMismatch { expected: Digest, actual: Digest },
}

/// Stores blobs as files under `root/<algorithm>/<encoded>`.
///
/// Each blob is written to a temporary file next to its final place and
/// renamed once its digest is known, so a failed copy leaves nothing behind.
#[derive(Debug, Clone)]
pub struct FileBlobSink {
    root:        PathBuf,
    compression: LayerCompression,
}

impl FileBlobSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root:        root.into(),
            compression: LayerCompression::PreserveOriginal,
        }
    }

    #[must_use]
    pub fn with_layer_compression(mut self, compression: LayerCompression) -> Self {
        self.compression = compression;
        self
    }

    pub fn root(&self) -> &Path { &self.root }

    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.root.join(digest.algorithm_name()).join(digest.encoded())
    }

    pub fn contains(&self, digest: &Digest) -> bool { self.blob_path(digest).is_file() }
}

impl BlobSink for FileBlobSink {
    type Error = FileSinkError;

    fn desired_layer_compression(&self) -> LayerCompression { self.compression }

    fn put_blob(
        &self,
        reader: &mut dyn Read,
        info: &BlobInfo,
        _options: PutBlobOptions,
    ) -> Result<UploadedBlob, FileSinkError> {
        if let Some(digest) = &info.digest {
            let path = self.blob_path(digest);
            if path.is_file() {
                debug!(%digest, "blob already present, skipping");
                let size = fs::metadata(&path)?.len();
                return Ok(UploadedBlob::new(digest.clone(), Some(size)));
            }
        }

        let algorithm = info
            .digest
            .as_ref()
            .and_then(|d| d.algorithm().ok())
            .unwrap_or(DigestAlgorithm::Sha256);

        fs::create_dir_all(&self.root)?;
        let mut temp = tempfile::NamedTempFile::new_in(&self.root)?;
        let mut hasher = algorithm.hasher();
        let mut size = 0u64;
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            hasher.update(&buf[..n]);
            temp.write_all(&buf[..n])?;
            size += n as u64;
        }
        temp.flush()?;

        let actual = Digest::from_bytes(algorithm, &hasher.finalize());
        if let Some(expected) = &info.digest {
            if *expected != actual {
                return Err(FileSinkError::DigestMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        let path = self.blob_path(&actual);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        temp.persist(&path)?;
        debug!(digest = %actual, size, "stored blob");

        Ok(UploadedBlob::new(actual, Some(size)))
    }
}
