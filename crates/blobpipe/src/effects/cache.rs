use std::collections::HashMap;
use std::sync::Mutex;

use blobpipe_verify::Digest;

/// Compressor name recorded for blobs known to be uncompressed.
pub const UNCOMPRESSED: &str = "uncompressed";

/// Knowledge about blobs gathered while copying them, kept by the caller
/// across copies. Only facts backed by a verified digest are recorded.
pub trait BlobInfoCache: Send + Sync {
    /// `uncompressed` is the digest of the uncompressed form of `any_digest`.
    fn record_digest_uncompressed_pair(&self, any_digest: &Digest, uncompressed: &Digest);

    /// `digest` is compressed with `compressor_name`, or [`UNCOMPRESSED`].
    fn record_digest_compressor_name(&self, digest: &Digest, compressor_name: &str);
}

/// In-memory [`BlobInfoCache`], lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryBlobInfoCache {
    state: Mutex<MemoryCacheState>,
}

#[derive(Debug, Default)]
struct MemoryCacheState {
    uncompressed: HashMap<Digest, Digest>,
    compressors:  HashMap<Digest, String>,
}

impl MemoryBlobInfoCache {
    pub fn new() -> Self { Self::default() }

    /// Digest of the uncompressed form of `digest`, if known.
    pub fn uncompressed_digest(&self, digest: &Digest) -> Option<Digest> {
        let state = self.state.lock().ok()?;
        if state.compressors.get(digest).map(String::as_str) == Some(UNCOMPRESSED) {
            return Some(digest.clone());
        }
        state.uncompressed.get(digest).cloned()
    }

    pub fn compressor_name(&self, digest: &Digest) -> Option<String> {
        self.state.lock().ok()?.compressors.get(digest).cloned()
    }
}

impl BlobInfoCache for MemoryBlobInfoCache {
    fn record_digest_uncompressed_pair(&self, any_digest: &Digest, uncompressed: &Digest) {
        if let Ok(mut state) = self.state.lock() {
            state.uncompressed.insert(any_digest.clone(), uncompressed.clone());
        }
    }

    fn record_digest_compressor_name(&self, digest: &Digest, compressor_name: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.compressors.insert(digest.clone(), compressor_name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobpipe_verify::DigestAlgorithm;

    fn digest(data: &[u8]) -> Digest { Digest::compute(DigestAlgorithm::Sha256, data) }

    #[test]
    fn records_pairs_and_names() {
        let cache = MemoryBlobInfoCache::new();
        let compressed = digest(b"compressed");
        let plain = digest(b"plain");

        cache.record_digest_uncompressed_pair(&compressed, &plain);
        cache.record_digest_compressor_name(&compressed, "gzip");

        assert_eq!(cache.uncompressed_digest(&compressed), Some(plain));
        assert_eq!(cache.compressor_name(&compressed).as_deref(), Some("gzip"));
    }

    #[test]
    fn uncompressed_blob_is_its_own_uncompressed_digest() {
        let cache = MemoryBlobInfoCache::new();
        let plain = digest(b"plain");
        cache.record_digest_compressor_name(&plain, UNCOMPRESSED);

        assert_eq!(cache.uncompressed_digest(&plain), Some(plain));
    }

    #[test]
    fn unknown_digest() {
        let cache = MemoryBlobInfoCache::new();
        assert_eq!(cache.uncompressed_digest(&digest(b"?")), None);
        assert_eq!(cache.compressor_name(&digest(b"?")), None);
    }
}
