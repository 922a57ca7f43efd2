//! Plain data types shared by the pipeline stages.
//!
//! Nothing in here performs I/O; values are cloned and passed between stages.

pub mod blob_info;
pub mod compression;
pub mod options;
pub mod progress;

pub use blob_info::{BlobInfo, CompressionOperation, LayerCompression, LayerCrypto, UploadedBlob};
pub use compression::{CompressionAlgorithm, MAX_PREFIX_LEN};
pub use options::CopyOptions;
pub use progress::{ProgressEvent, ProgressProperties};
