//! Pure decisions behind the pipeline.
//!
//! Nothing here touches a stream: format classification, the compression
//! decision table and the metadata edits applied after a successful write.

mod crypto;
mod detect;
mod edits;
mod plan;

pub use crypto::{
    is_encrypted_media_type, strip_encryption_annotations, ENCRYPTED_SUFFIX,
    ENCRYPTION_ANNOTATION_PREFIX,
};
pub use detect::{detect_compression, expected_compression};
pub use edits::{CompressionEdit, DecryptionEdit, EncryptionEdit, EncryptionFinalizer, PendingEdits};
pub use plan::{plan_compression, CompressionPlan};
