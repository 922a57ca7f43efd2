//! Decryption and encryption stages.
//!
//! The ciphers themselves are supplied by the caller through [`Decrypter`]
//! and [`Encrypter`]; these stages only decide when to call them and keep the
//! blob's metadata consistent with the bytes.

use blobpipe_verify::Digest;
use tracing::debug;

use crate::core::{is_encrypted_media_type, strip_encryption_annotations, DecryptionEdit, EncryptionEdit, EncryptionFinalizer};
use crate::data::BlobInfo;
use crate::effects::readers::{BoxRead, SourceStream};
use crate::error::{digest_label, BoxError, CopyError, Result};

/// Decrypts blobs with an `+encrypted` media type.
pub trait Decrypter: Send + Sync {
    /// Return a reader of the plaintext and, if the decrypter knows it, the
    /// plaintext's digest.
    fn decrypt(&self, reader: BoxRead, info: &BlobInfo) -> std::result::Result<(BoxRead, Option<Digest>), BoxError>;
}

/// Encrypts blobs on their way to the sink.
pub trait Encrypter: Send + Sync {
    /// Return a reader of the ciphertext and a finalizer producing the
    /// encryption annotations. The finalizer is only called after every byte
    /// of the returned reader was consumed.
    fn encrypt(
        &self,
        reader: BoxRead,
        descriptor: &BlobInfo,
    ) -> std::result::Result<(BoxRead, EncryptionFinalizer), BoxError>;
}

/// Decrypt `stream` in place if its media type says it is encrypted and a
/// decrypter is available.
pub fn decryption_step(stream: &mut SourceStream, decrypter: Option<&dyn Decrypter>) -> Result<DecryptionEdit> {
    let Some(decrypter) = decrypter else {
        return Ok(DecryptionEdit::default());
    };
    if !is_encrypted_media_type(&stream.info.media_type) {
        return Ok(DecryptionEdit::default());
    }

    let digest = digest_label(stream.info.digest.as_ref());
    debug!(%digest, "decrypting blob");

    let info = stream.info.clone();
    let mut plaintext_digest = None;
    stream.try_wrap(|r| {
        let (reader, decrypted_digest) =
            decrypter.decrypt(r, &info).map_err(|source| CopyError::Decrypt { digest, source })?;
        plaintext_digest = decrypted_digest;
        Ok::<_, CopyError>(reader)
    })?;

    stream.info.digest = plaintext_digest;
    stream.info.size = None;
    strip_encryption_annotations(&mut stream.info.annotations);

    Ok(DecryptionEdit { decrypted: true })
}

/// Encrypt `stream` in place when asked to and an encrypter is available.
///
/// Blobs already carrying an encrypted media type are left alone. When the
/// source was decrypted in this copy, its annotations are not passed on.
pub fn encryption_step(
    stream: &mut SourceStream,
    to_encrypt: bool,
    encrypter: Option<&dyn Encrypter>,
    source_decrypted: bool,
) -> Result<EncryptionEdit> {
    let Some(encrypter) = encrypter.filter(|_| to_encrypt) else {
        return Ok(EncryptionEdit::default());
    };
    if is_encrypted_media_type(&stream.info.media_type) {
        return Ok(EncryptionEdit::default());
    }

    let mut descriptor = BlobInfo::new(stream.info.digest.clone(), stream.info.size, stream.info.media_type.clone());
    if !source_decrypted {
        descriptor.annotations = stream.info.annotations.clone();
    }

    let digest = digest_label(stream.info.digest.as_ref());
    debug!(%digest, "encrypting blob");

    let mut finalizer = None;
    stream.try_wrap(|r| {
        let (reader, fin) = encrypter
            .encrypt(r, &descriptor)
            .map_err(|source| CopyError::Encrypt { digest, source })?;
        finalizer = Some(fin);
        Ok::<_, CopyError>(reader)
    })?;
    stream.info.clear_content_identity();

    Ok(finalizer.map(EncryptionEdit::new).unwrap_or_default())
}
