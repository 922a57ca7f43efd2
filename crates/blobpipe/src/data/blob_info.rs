use std::collections::BTreeMap;
use std::fmt;

use blobpipe_verify::Digest;
use serde::{Deserialize, Serialize};

use super::compression::CompressionAlgorithm;

/// Describes a blob: what it is and, once copied, what was done to it.
///
/// Inside the pipeline a `BlobInfo` always describes exactly the bytes of the
/// reader it travels with. A stage that changes the bytes clears
/// [`digest`](Self::digest) and [`size`](Self::size) rather than leaving them
/// to describe the original form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobInfo {
    /// Content digest; `None` when unknown.
    pub digest: Option<Digest>,

    /// Size in bytes; `None` when unknown.
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default)]
    pub media_type: String,

    /// Compression change applied while copying.
    #[serde(default)]
    pub compression_operation: CompressionOperation,

    /// Compression of the stored blob, `None` if uncompressed or unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_algorithm: Option<CompressionAlgorithm>,

    /// Crypto change applied while copying.
    #[serde(default)]
    pub crypto_operation: LayerCrypto,
}

impl BlobInfo {
    pub fn new(digest: Option<Digest>, size: Option<u64>, media_type: impl Into<String>) -> Self {
        Self {
            digest,
            size,
            media_type: media_type.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Forget digest and size after the bytes were changed.
    pub(crate) fn clear_content_identity(&mut self) {
        self.digest = None;
        self.size = None;
    }
}

/// What the sink reports after storing a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedBlob {
    /// Digest of the stored bytes, as computed by the sink.
    pub digest: Digest,
    pub size: Option<u64>,
    pub annotations: BTreeMap<String, String>,
}

impl UploadedBlob {
    pub fn new(digest: Digest, size: Option<u64>) -> Self {
        Self {
            digest,
            size,
            annotations: BTreeMap::new(),
        }
    }
}

/// Compression a destination would like its layers stored with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerCompression {
    #[default]
    PreserveOriginal,
    Compress,
    Decompress,
}

/// Compression change that was actually applied to a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionOperation {
    #[default]
    PreserveOriginal,
    /// Uncompressed input was compressed.
    Compress,
    /// Compressed input was decompressed.
    Decompress,
    /// Compressed input was decompressed and compressed with another algorithm.
    Recompress,
}

impl CompressionOperation {
    pub fn changes_blob(&self) -> bool { *self != CompressionOperation::PreserveOriginal }
}

impl fmt::Display for CompressionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionOperation::PreserveOriginal => write!(f, "preserve original"),
            CompressionOperation::Compress => write!(f, "compress"),
            CompressionOperation::Decompress => write!(f, "decompress"),
            CompressionOperation::Recompress => write!(f, "recompress"),
        }
    }
}

/// Crypto change applied to a blob. Only one per copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerCrypto {
    #[default]
    PreserveOriginal,
    Encrypt,
    Decrypt,
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobpipe_verify::DigestAlgorithm;

    #[test]
    fn defaults_describe_an_untouched_blob() {
        let info = BlobInfo::default();
        assert_eq!(info.digest, None);
        assert_eq!(info.size, None);
        assert_eq!(info.compression_operation, CompressionOperation::PreserveOriginal);
        assert_eq!(info.crypto_operation, LayerCrypto::PreserveOriginal);
        assert!(!info.compression_operation.changes_blob());
    }

    #[test]
    fn clear_content_identity_keeps_metadata() {
        let mut info = BlobInfo::new(
            Some(Digest::compute(DigestAlgorithm::Sha256, b"x")),
            Some(1),
            "application/vnd.oci.image.layer.v1.tar",
        )
        .annotation("k", "v");
        info.clear_content_identity();

        assert_eq!(info.digest, None);
        assert_eq!(info.size, None);
        assert_eq!(info.media_type, "application/vnd.oci.image.layer.v1.tar");
        assert_eq!(info.annotations.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn blob_info_json_shape() {
        let digest = Digest::compute(DigestAlgorithm::Sha256, b"layer");
        let info = BlobInfo::new(Some(digest.clone()), Some(5), "application/octet-stream");
        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["digest"], digest.to_string());
        assert_eq!(json["size"], 5);
        assert_eq!(json["mediaType"], "application/octet-stream");
        assert_eq!(json["compressionOperation"], "preserve_original");

        let back: BlobInfo = serde_json::from_value(json).unwrap();
        assert_eq!(back, info);
    }
}
