//! Content digests in the `algorithm:encoded` form used by image registries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::hasher::{AlgorithmHasher, Hasher};
use crate::{Result, VerificationError};

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Get the digest length in bytes for this algorithm.
    pub fn digest_length(&self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha384 => "sha384",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }

    pub fn hasher(&self) -> AlgorithmHasher { AlgorithmHasher::new(*self) }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "sha256" => Some(DigestAlgorithm::Sha256),
            "sha384" => Some(DigestAlgorithm::Sha384),
            "sha512" => Some(DigestAlgorithm::Sha512),
            _ => None,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// A syntactically valid content digest, e.g. `sha256:b94d27b9...`.
///
/// For the algorithms in [`DigestAlgorithm`] the encoded part is lowercase hex
/// of exactly [`DigestAlgorithm::digest_length`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
    algorithm: String,
    encoded:   String,
}

impl Digest {
    /// Parse a digest string with an algorithm prefix (e.g. `"sha256:abc..."`).
    ///
    /// Only the syntax is checked for algorithms we do not know; use
    /// [`Digest::algorithm`] to find out whether the digest can be computed.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || VerificationError::InvalidDigest(s.to_string());
        let (algo, encoded) = s.split_once(':').ok_or_else(invalid)?;

        if !is_algorithm_component(algo) || encoded.is_empty() {
            return Err(invalid());
        }
        if !encoded
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'=' | b'_' | b'-'))
        {
            return Err(invalid());
        }

        if let Some(algorithm) = DigestAlgorithm::from_name(algo) {
            if encoded.len() != algorithm.digest_length() * 2
                || !encoded.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
            {
                return Err(invalid());
            }
        }

        Ok(Self {
            algorithm: algo.to_string(),
            encoded:   encoded.to_string(),
        })
    }

    /// Build a digest from raw hash output.
    pub fn from_bytes(algorithm: DigestAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm: algorithm.as_str().to_string(),
            encoded:   hex::encode(bytes),
        }
    }

    /// Hash `data` in one go.
    pub fn compute(algorithm: DigestAlgorithm, data: &[u8]) -> Self {
        let mut hasher = algorithm.hasher();
        hasher.update(data);
        Self::from_bytes(algorithm, &hasher.finalize())
    }

    /// The algorithm this digest was computed with.
    ///
    /// Fails with [`VerificationError::UnsupportedAlgorithm`] when the prefix
    /// names an algorithm that cannot be computed here.
    pub fn algorithm(&self) -> Result<DigestAlgorithm> {
        DigestAlgorithm::from_name(&self.algorithm).ok_or_else(|| {
            VerificationError::UnsupportedAlgorithm {
                digest:    self.to_string(),
                algorithm: self.algorithm.clone(),
            }
        })
    }

    pub fn algorithm_name(&self) -> &str { &self.algorithm }

    pub fn encoded(&self) -> &str { &self.encoded }
}

// [a-z0-9]+ separated by any of [+._-]
fn is_algorithm_component(s: &str) -> bool {
    !s.is_empty()
        && s.split(['+', '.', '_', '-'])
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()))
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.encoded)
    }
}

impl FromStr for Digest {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl TryFrom<String> for Digest {
    type Error = VerificationError;

    fn try_from(s: String) -> Result<Self> { Self::parse(&s) }
}

impl From<Digest> for String {
    fn from(d: Digest) -> Self { d.to_string() }
}
