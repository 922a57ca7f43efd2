//! Metadata edits recorded while the pipeline is built and applied to the
//! sink's result once the write succeeded.

use std::collections::BTreeMap;
use std::fmt;

use crate::data::{BlobInfo, CompressionAlgorithm, CompressionOperation, LayerCrypto};
use crate::error::{BoxError, CopyError, Result};

/// Produces the encryption annotations once every byte has been encrypted.
pub type EncryptionFinalizer =
    Box<dyn FnOnce() -> std::result::Result<BTreeMap<String, String>, BoxError> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompressionEdit {
    pub operation: CompressionOperation,
    pub algorithm: Option<CompressionAlgorithm>,
}

impl CompressionEdit {
    pub fn apply(&self, info: &mut BlobInfo) {
        info.compression_operation = self.operation;
        info.compression_algorithm = self.algorithm;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecryptionEdit {
    pub decrypted: bool,
}

impl DecryptionEdit {
    pub fn apply(&self, info: &mut BlobInfo) {
        if self.decrypted {
            info.crypto_operation = LayerCrypto::Decrypt;
        }
    }
}

#[derive(Default)]
pub struct EncryptionEdit {
    finalizer: Option<EncryptionFinalizer>,
}

impl EncryptionEdit {
    pub fn new(finalizer: EncryptionFinalizer) -> Self {
        Self {
            finalizer: Some(finalizer),
        }
    }

    pub fn is_encrypting(&self) -> bool { self.finalizer.is_some() }

    /// Runs the finalizer; only valid after the sink consumed the stream.
    pub fn apply(self, info: &mut BlobInfo) -> Result<()> {
        let Some(finalizer) = self.finalizer else {
            return Ok(());
        };
        let annotations = finalizer().map_err(|source| CopyError::EncryptionFinalize { source })?;
        info.crypto_operation = LayerCrypto::Encrypt;
        info.annotations.extend(annotations);
        Ok(())
    }
}

impl fmt::Debug for EncryptionEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionEdit")
            .field("encrypting", &self.is_encrypting())
            .finish()
    }
}

/// Every edit one copy produced, applied in a fixed order: compression,
/// then decryption, then encryption.
#[derive(Debug, Default)]
pub struct PendingEdits {
    pub compression: CompressionEdit,
    pub decryption:  DecryptionEdit,
    pub encryption:  EncryptionEdit,
}

impl PendingEdits {
    pub fn apply(self, info: &mut BlobInfo) -> Result<()> {
        self.compression.apply(info);
        self.decryption.apply(info);
        self.encryption.apply(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type FinalizerResult = std::result::Result<BTreeMap<String, String>, BoxError>;

    #[test]
    fn empty_edits_leave_info_untouched() {
        let mut info = BlobInfo::default().annotation("a", "1");
        let before = info.clone();
        PendingEdits::default().apply(&mut info).unwrap();
        assert_eq!(info, before);
    }

    #[test]
    fn compression_edit_overwrites_fields() {
        let mut info = BlobInfo {
            compression_algorithm: Some(CompressionAlgorithm::Zstd),
            ..BlobInfo::default()
        };
        CompressionEdit {
            operation: CompressionOperation::Decompress,
            algorithm: None,
        }
        .apply(&mut info);
        assert_eq!(info.compression_operation, CompressionOperation::Decompress);
        assert_eq!(info.compression_algorithm, None);
    }

    #[test]
    fn encryption_edit_merges_annotations() {
        let mut info = BlobInfo::default().annotation("a", "1");
        let edit = EncryptionEdit::new(Box::new(|| -> FinalizerResult {
            Ok(BTreeMap::from([(
                "org.opencontainers.image.enc.keys.jwe".to_string(),
                "key".to_string(),
            )]))
        }));
        edit.apply(&mut info).unwrap();

        assert_eq!(info.crypto_operation, LayerCrypto::Encrypt);
        assert_eq!(info.annotations.len(), 2);
    }

    #[test]
    fn encryption_finalizer_failure_is_reported() {
        let mut info = BlobInfo::default();
        let edit = EncryptionEdit::new(Box::new(|| -> FinalizerResult { Err("key wrap failed".into()) }));
        let err = edit.apply(&mut info).unwrap_err();

        assert!(matches!(err, CopyError::EncryptionFinalize { .. }));
        assert_eq!(info.crypto_operation, LayerCrypto::PreserveOriginal);
    }

    #[test]
    fn edits_apply_in_order() {
        let mut info = BlobInfo::default();
        let edits = PendingEdits {
            compression: CompressionEdit {
                operation: CompressionOperation::Compress,
                algorithm: Some(CompressionAlgorithm::Gzip),
            },
            decryption:  DecryptionEdit { decrypted: true },
            encryption:  EncryptionEdit::default(),
        };
        edits.apply(&mut info).unwrap();

        assert_eq!(info.compression_operation, CompressionOperation::Compress);
        assert_eq!(info.compression_algorithm, Some(CompressionAlgorithm::Gzip));
        assert_eq!(info.crypto_operation, LayerCrypto::Decrypt);
    }
}
