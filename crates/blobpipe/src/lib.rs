//! Single-pass blob copying with digest verification, compression and
//! encryption stages.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Plain types describing blobs, options and progress
//! - [`core`] - Pure decisions (format detection, compression plan, metadata edits)
//! - [`effects`] - Stream stages, collaborator traits and the [`Copier`]
//!
//! # Key Features
//!
//! - **Single-Pass**: the source is read once through a stack of readers; nothing is buffered whole
//! - **Verified**: the source digest is checked while streaming and a mismatch never yields a result
//! - **Honest Metadata**: the returned [`BlobInfo`] names every compression or crypto change made
//! - **Mechanism-Only**: codecs are built in, ciphers and storage are supplied by the caller
//!
//! # Example
//!
//! ```
//! use blobpipe::{BlobCopyRequest, BlobInfo, Copier, Digest, DigestAlgorithm, FileBlobSink, LayerCompression};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let sink = FileBlobSink::new(dir.path()).with_layer_compression(LayerCompression::Compress);
//! let copier = Copier::new(sink);
//!
//! let layer = vec![0u8; 1024];
//! let info = BlobInfo::new(
//!     Some(Digest::compute(DigestAlgorithm::Sha256, &layer)),
//!     Some(layer.len() as u64),
//!     "application/vnd.oci.image.layer.v1.tar",
//! );
//! let copied = copier
//!     .copy_blob_from_stream(std::io::Cursor::new(layer), &info, BlobCopyRequest::layer(0))
//!     .unwrap();
//!
//! assert_ne!(copied.digest, info.digest);
//! assert_eq!(copied.compression_algorithm, Some(blobpipe::CompressionAlgorithm::Gzip));
//! ```

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use blobpipe_verify::{Digest, DigestAlgorithm, Validation, VerificationError};
pub use data::{
    BlobInfo, CompressionAlgorithm, CompressionOperation, CopyOptions, LayerCompression, LayerCrypto,
    ProgressEvent, ProgressProperties, UploadedBlob,
};
pub use effects::{
    BlobCopyRequest, BlobInfoCache, BlobSink, Copier, Decompressor, Decrypter, Encrypter, FileBlobSink,
    FileSinkError, MemoryBlobInfoCache, PutBlobOptions,
};
pub use crate::core::EncryptionFinalizer;
pub use error::{BoxError, CopyError, Result, SourceReadError};
