//! Content digests and streaming digest verification for blob copies.
//!
//! Provides incremental hashing and verification without enforcing a
//! verification policy. The [`DigestingReader`] only records whether the
//! bytes it saw matched; the caller decides what a mismatch means.
//!
//! # Example
//!
//! ```
//! use blobpipe_verify::{Digest, DigestAlgorithm, DigestingReader};
//!
//! let data = b"hello world";
//! let expected = Digest::compute(DigestAlgorithm::Sha256, data);
//!
//! let mut reader = DigestingReader::new(&data[..], Some(expected)).unwrap();
//! let validation = reader.validation();
//! std::io::copy(&mut reader, &mut std::io::sink()).unwrap();
//!
//! assert!(validation.succeeded());
//! ```

pub use self::digest::{Digest, DigestAlgorithm};
pub use self::error::{Result, VerificationError};
pub use self::hasher::{AlgorithmHasher, DigestHasher, Hasher, Sha256Hasher};
pub use self::reader::{DigestingReader, Validation};

mod digest;
mod error;
mod hasher;
mod reader;
