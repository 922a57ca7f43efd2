use std::collections::BTreeMap;

/// Media type suffix marking an encrypted layer.
pub const ENCRYPTED_SUFFIX: &str = "+encrypted";

/// Prefix of the annotations that carry encryption metadata.
pub const ENCRYPTION_ANNOTATION_PREFIX: &str = "org.opencontainers.image.enc";

pub fn is_encrypted_media_type(media_type: &str) -> bool { media_type.ends_with(ENCRYPTED_SUFFIX) }

/// Drop the encryption annotations, which no longer apply once a blob was
/// decrypted.
pub fn strip_encryption_annotations(annotations: &mut BTreeMap<String, String>) {
    annotations.retain(|key, _| !key.starts_with(ENCRYPTION_ANNOTATION_PREFIX));
}
