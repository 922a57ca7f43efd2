use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::compression::CompressionAlgorithm;

/// Copier-wide configuration, shared by every blob copied with it.
///
/// # Examples
///
/// ```
/// use blobpipe::{CompressionAlgorithm, CopyOptions};
/// use std::time::Duration;
///
/// let options = CopyOptions::default()
///     .compression_format(CompressionAlgorithm::Gzip)
///     .compression_level(6)
///     .progress_interval(Duration::from_millis(250));
/// ```
///
/// The options also load from configuration files:
///
/// ```
/// use blobpipe::CopyOptions;
///
/// let options: CopyOptions =
///     serde_json::from_str(r#"{ "compression_format": "zstd", "progress_interval_ms": 500 }"#).unwrap();
/// assert_eq!(options.progress_interval.as_millis(), 500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyOptions {
    /// Algorithm to use when compressing, and to recompress into when a
    /// modifiable blob arrives compressed with something else.
    ///
    /// `None` compresses with gzip and never recompresses.
    pub compression_format: Option<CompressionAlgorithm>,

    /// Codec-specific compression level; the codec default when `None`.
    pub compression_level: Option<i32>,

    /// Minimum time between `Read` progress notifications.
    ///
    /// Progress notifications are disabled while this is zero.
    #[serde(rename = "progress_interval_ms", with = "duration_millis")]
    pub progress_interval: Duration,
}

impl CopyOptions {
    #[must_use]
    pub fn compression_format(mut self, format: CompressionAlgorithm) -> Self {
        self.compression_format = Some(format);
        self
    }

    #[must_use]
    pub fn compression_level(mut self, level: i32) -> Self {
        self.compression_level = Some(level);
        self
    }

    #[must_use]
    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Algorithm used when an uncompressed blob is compressed.
    pub fn compress_with(&self) -> CompressionAlgorithm {
        self.compression_format.unwrap_or(CompressionAlgorithm::Gzip)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
