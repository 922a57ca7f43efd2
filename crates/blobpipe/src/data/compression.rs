use std::fmt;

use serde::{Deserialize, Serialize};

/// Compression algorithms recognised in blob streams.
///
/// `Bzip2` is recognised so it is not mistaken for uncompressed data, but no
/// codec is available for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    Gzip,
    Zstd,
    Xz,
    Bzip2,
}

/// Fixed number of bytes peeked for detection. Every magic prefix fits in it;
/// detection never reads more than this.
pub const MAX_PREFIX_LEN: usize = 8;

impl CompressionAlgorithm {
    pub const ALL: [CompressionAlgorithm; 4] = [
        CompressionAlgorithm::Gzip,
        CompressionAlgorithm::Bzip2,
        CompressionAlgorithm::Xz,
        CompressionAlgorithm::Zstd,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CompressionAlgorithm::Gzip => "gzip",
            CompressionAlgorithm::Zstd => "zstd",
            CompressionAlgorithm::Xz => "xz",
            CompressionAlgorithm::Bzip2 => "bzip2",
        }
    }

    /// Magic bytes every stream of this format starts with.
    pub fn prefix(&self) -> &'static [u8] {
        match self {
            CompressionAlgorithm::Gzip => &[0x1F, 0x8B, 0x08],
            CompressionAlgorithm::Bzip2 => &[0x42, 0x5A, 0x68],
            CompressionAlgorithm::Xz => &[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00],
            CompressionAlgorithm::Zstd => &[0x28, 0xB5, 0x2F, 0xFD],
        }
    }

    /// Whether this build can encode and decode the format.
    pub fn has_codec(&self) -> bool {
        match self {
            CompressionAlgorithm::Gzip => true,
            CompressionAlgorithm::Zstd => cfg!(feature = "zstd"),
            CompressionAlgorithm::Xz => cfg!(feature = "xz"),
            CompressionAlgorithm::Bzip2 => false,
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}
