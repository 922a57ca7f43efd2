use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::digest::{Digest, DigestAlgorithm};
use crate::hasher::{AlgorithmHasher, Hasher};
use crate::Result;

/// Outcome of a [`DigestingReader`], shared with whoever needs it after the
/// reader itself has been moved into a pipeline.
///
/// At most one of [`succeeded`](Self::succeeded) and [`failed`](Self::failed)
/// is ever true. Both stay false until end of stream is observed, and always
/// stay false when no digest was expected.
#[derive(Debug, Default)]
pub struct Validation {
    succeeded: AtomicBool,
    failed:    AtomicBool,
    computed:  Mutex<Option<Digest>>,
}

impl Validation {
    pub fn succeeded(&self) -> bool { self.succeeded.load(Ordering::Acquire) }

    pub fn failed(&self) -> bool { self.failed.load(Ordering::Acquire) }

    /// Digest of everything read, available once end of stream was reached.
    pub fn computed_digest(&self) -> Option<Digest> {
        self.computed.lock().ok().and_then(|d| d.clone())
    }
}

/// Streaming reader that hashes data as it passes through and compares the
/// result against the expected digest at end of stream.
///
/// A mismatch is only recorded in [`Validation`]; the read itself still
/// succeeds. A consumer that stops early must not be mistaken for corruption,
/// so the decision is left to whoever drives the stream.
pub struct DigestingReader<R> {
    source:     R,
    algorithm:  DigestAlgorithm,
    hasher:     Option<AlgorithmHasher>,
    expected:   Option<Digest>,
    validation: Arc<Validation>,
}

impl<R> DigestingReader<R> {
    /// Create a new digesting reader.
    ///
    /// Without an expected digest the data is still hashed with SHA-256 so the
    /// computed digest can be reported. Fails if the expected digest names an
    /// algorithm that cannot be computed.
    pub fn new(source: R, expected: Option<Digest>) -> Result<Self> {
        let algorithm = match &expected {
            Some(digest) => digest.algorithm()?,
            None => DigestAlgorithm::default(),
        };

        Ok(Self {
            source,
            algorithm,
            hasher: Some(algorithm.hasher()),
            expected,
            validation: Arc::new(Validation::default()),
        })
    }

    pub fn validation(&self) -> Arc<Validation> { Arc::clone(&self.validation) }

    fn finish(&mut self) {
        let Some(hasher) = self.hasher.take() else {
            return;
        };
        let actual = Digest::from_bytes(self.algorithm, &hasher.finalize());

        if let Some(expected) = &self.expected {
            if *expected == actual {
                self.validation.succeeded.store(true, Ordering::Release);
            } else {
                self.validation.failed.store(true, Ordering::Release);
            }
        }
        if let Ok(mut computed) = self.validation.computed.lock() {
            *computed = Some(actual);
        }
    }
}

impl<R: Read> Read for DigestingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.source.read(buf)?;
        if n > 0 {
            if let Some(hasher) = self.hasher.as_mut() {
                hasher.update(&buf[..n]);
            }
        } else if !buf.is_empty() {
            self.finish();
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::Sha256Hasher;

    fn digest_of(data: &[u8]) -> Digest { Digest::compute(DigestAlgorithm::Sha256, data) }

    #[test]
    fn test_sha256_hasher() {
        let mut hasher = Sha256Hasher::new();
        hasher.update(b"hello world");
        let hash = hasher.finalize();

        let expected =
            hex::decode("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
                .unwrap();
        assert_eq!(hash, expected);
    }

    #[test]
    fn test_digesting_reader_success() {
        let data = b"test data for verification";

        let mut reader = DigestingReader::new(Cursor::new(data), Some(digest_of(data))).unwrap();
        let validation = reader.validation();

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).unwrap();

        assert_eq!(buffer, data);
        assert!(validation.succeeded());
        assert!(!validation.failed());
        assert_eq!(validation.computed_digest(), Some(digest_of(data)));
    }

    #[test]
    fn test_digesting_reader_mismatch_only_flags() {
        let data = b"test data";
        let wrong = digest_of(b"other data");

        let mut reader = DigestingReader::new(Cursor::new(data), Some(wrong)).unwrap();
        let validation = reader.validation();

        let mut buffer = Vec::new();
        // The mismatch does not surface as a read error.
        reader.read_to_end(&mut buffer).unwrap();

        assert!(validation.failed());
        assert!(!validation.succeeded());
    }

    #[test]
    fn test_partial_read_sets_nothing() {
        let data = vec![7u8; 4096];
        let mut reader = DigestingReader::new(Cursor::new(data.clone()), Some(digest_of(&data))).unwrap();
        let validation = reader.validation();

        let mut buffer = [0u8; 16];
        reader.read_exact(&mut buffer).unwrap();

        assert!(!validation.succeeded());
        assert!(!validation.failed());
        assert_eq!(validation.computed_digest(), None);
    }

    #[test]
    fn test_no_expected_digest_still_computes() {
        let data = b"fresh metadata";
        let mut reader = DigestingReader::new(Cursor::new(data), None).unwrap();
        let validation = reader.validation();

        std::io::copy(&mut reader, &mut std::io::sink()).unwrap();

        assert!(!validation.succeeded());
        assert!(!validation.failed());
        assert_eq!(validation.computed_digest(), Some(digest_of(data)));
    }

    #[test]
    fn test_sha512_expected_digest() {
        let data = b"sha512 content";
        let expected = Digest::compute(DigestAlgorithm::Sha512, data);
        let mut reader = DigestingReader::new(Cursor::new(data), Some(expected)).unwrap();
        let validation = reader.validation();

        std::io::copy(&mut reader, &mut std::io::sink()).unwrap();

        assert!(validation.succeeded());
    }

    #[test]
    fn test_unsupported_algorithm_fails_setup() {
        let digest = Digest::parse("md5:d41d8cd98f00b204e9800998ecf8427e").unwrap();
        let result = DigestingReader::new(Cursor::new(b""), Some(digest));
        assert!(matches!(result, Err(crate::VerificationError::UnsupportedAlgorithm { .. })));
    }
}
