//! Stream stages and the collaborators they talk to.
//!
//! Each stage takes the [`SourceStream`] built so far and replaces its reader
//! with one layered on top. The [`Copier`] applies them in order and drives
//! the [`BlobSink`].

mod cache;
mod compression;
mod copier;
mod crypto;
mod progress;
mod readers;
mod sink;

pub use cache::{BlobInfoCache, MemoryBlobInfoCache, UNCOMPRESSED};
pub use compression::{
    compress, compression_step, detect_compression_step, CompressionStep, Decompressor, DetectedCompression,
};
pub use copier::{BlobCopyRequest, Copier, OriginalLayerWriter};
pub use crypto::{decryption_step, encryption_step, Decrypter, Encrypter};
pub use progress::{meter, ProgressReader, ProgressSession};
pub use readers::{BoxRead, ErrorAnnotationReader, SharedReader, SourceStream, TeeReader};
pub use sink::{BlobSink, FileBlobSink, FileSinkError, PutBlobOptions};
