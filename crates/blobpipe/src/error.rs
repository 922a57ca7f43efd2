//! Error types for blobpipe.

use std::error::Error as StdError;
use std::io;

use blobpipe_verify::{Digest, VerificationError};
use thiserror::Error;

use crate::data::CompressionAlgorithm;

/// Boxed error from a collaborator (sink, decrypter, encrypter).
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Why a single blob copy failed.
///
/// Every variant aborts only the blob being copied; whether a larger
/// operation goes on is up to the caller.
#[derive(Debug, Error)]
pub enum CopyError {
    #[error("preparing to verify blob {digest}: {source}")]
    InvalidDigest {
        digest: String,
        #[source]
        source: VerificationError,
    },

    #[error("unable to support both decryption and encryption in the same copy")]
    ConflictingCrypto,

    #[error("decrypting blob {digest}: {source}")]
    Decrypt {
        digest: String,
        #[source]
        source: BoxError,
    },

    #[error("encrypting blob {digest}: {source}")]
    Encrypt {
        digest: String,
        #[source]
        source: BoxError,
    },

    #[error("reading blob {digest} while detecting compression: {source}")]
    DetectCompression {
        digest: String,
        #[source]
        source: io::Error,
    },

    #[error("setting up {algorithm} codec: {source}")]
    Codec {
        algorithm: CompressionAlgorithm,
        #[source]
        source: io::Error,
    },

    #[error("no codec available for {0} compression")]
    UnsupportedCompression(CompressionAlgorithm),

    /// The source failed while the sink was reading it.
    #[error("reading blob {digest}: {source}")]
    ReadInput {
        digest: String,
        #[source]
        source: BoxError,
    },

    /// The sink failed to store the blob.
    #[error("writing blob: {source}")]
    Write {
        #[source]
        source: BoxError,
    },

    /// The bytes are stored but the encryption annotations could not be
    /// produced, so the result cannot be described.
    #[error("unable to finalize encryption: {source}")]
    EncryptionFinalize {
        #[source]
        source: BoxError,
    },

    /// The source did not match its digest, yet the sink accepted it.
    #[error("internal error writing blob {digest}, digest verification failed but was ignored")]
    DigestVerificationIgnored { digest: String },

    /// The sink stored the blob under a digest other than the one it was given.
    #[error("internal error writing blob {digest}, blob with digest {expected} saved with digest {actual}")]
    DigestIdentityViolated {
        digest:   String,
        expected: Digest,
        actual:   Digest,
    },

    /// Feeding the rest of the source to the side consumer failed.
    #[error("reading input blob {digest}: {source}")]
    Drain {
        digest: String,
        #[source]
        source: io::Error,
    },
}

impl CopyError {
    /// `true` for contract violations that should never happen with a
    /// correct sink.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            CopyError::DigestVerificationIgnored { .. } | CopyError::DigestIdentityViolated { .. }
        )
    }

    /// `true` when the sink had already accepted the bytes, so the
    /// destination may hold data that is not referenced by anything.
    pub fn bytes_may_be_stored(&self) -> bool {
        matches!(
            self,
            CopyError::EncryptionFinalize { .. }
                | CopyError::DigestVerificationIgnored { .. }
                | CopyError::DigestIdentityViolated { .. }
                | CopyError::Drain { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CopyError>;

/// Marks an I/O error as coming from the source side of the pipeline.
///
/// The sink sees these wrapped in an [`io::Error`] of the original kind. When
/// it hands one back, [`SourceReadError::find`] lets the copier report a read
/// failure instead of a write failure.
#[derive(Debug, Error)]
#[error("happened during read: {source}")]
pub struct SourceReadError {
    #[source]
    source: io::Error,
}

impl SourceReadError {
    pub(crate) fn wrap(source: io::Error) -> io::Error {
        io::Error::new(source.kind(), SourceReadError { source })
    }

    /// Look for a `SourceReadError` anywhere in an error chain, including
    /// inside `io::Error` payloads.
    pub fn find<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a SourceReadError> {
        let mut current = Some(err);
        while let Some(e) = current {
            if let Some(found) = e.downcast_ref::<SourceReadError>() {
                return Some(found);
            }
            if let Some(found) = e
                .downcast_ref::<io::Error>()
                .and_then(|io| io.get_ref())
                .and_then(|inner| inner.downcast_ref::<SourceReadError>())
            {
                return Some(found);
            }
            current = e.source();
        }
        None
    }
}

/// Human-readable label for a possibly unknown digest.
pub(crate) fn digest_label(digest: Option<&Digest>) -> String {
    digest.map_or_else(|| "(unknown digest)".to_string(), Digest::to_string)
}
