//! Compression detection and the compression transform stage.

use std::io::{Cursor, Read};

use blobpipe_verify::Digest;
use tracing::debug;

use crate::core::{detect_compression, expected_compression, plan_compression, CompressionEdit, CompressionPlan};
use crate::data::{CompressionAlgorithm, CompressionOperation, CopyOptions, LayerCompression, MAX_PREFIX_LEN};
use crate::effects::cache::{BlobInfoCache, UNCOMPRESSED};
use crate::effects::readers::{BoxRead, SourceStream};
use crate::error::{digest_label, CopyError, Result};

/// Capability to decompress one format. Holds no stream; call
/// [`decompress`](Self::decompress) to open one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decompressor {
    algorithm: CompressionAlgorithm,
}

impl Decompressor {
    pub fn algorithm(&self) -> CompressionAlgorithm { self.algorithm }

    pub fn decompress(&self, reader: BoxRead) -> Result<BoxRead> {
        match self.algorithm {
            CompressionAlgorithm::Gzip => Ok(Box::new(flate2::read::MultiGzDecoder::new(reader))),
            #[cfg(feature = "zstd")]
            CompressionAlgorithm::Zstd => {
                let decoder = zstd::stream::read::Decoder::new(reader).map_err(|source| CopyError::Codec {
                    algorithm: CompressionAlgorithm::Zstd,
                    source,
                })?;
                Ok(Box::new(decoder))
            }
            #[cfg(feature = "xz")]
            CompressionAlgorithm::Xz => Ok(Box::new(xz2::read::XzDecoder::new(reader))),
            other => Err(CopyError::UnsupportedCompression(other)),
        }
    }
}

/// Wrap `reader` so that it yields its bytes compressed with `algorithm`.
pub fn compress(algorithm: CompressionAlgorithm, level: Option<i32>, reader: BoxRead) -> Result<BoxRead> {
    match algorithm {
        CompressionAlgorithm::Gzip => {
            let level = level.map_or_else(flate2::Compression::default, |l| {
                flate2::Compression::new(l.clamp(0, 9) as u32)
            });
            Ok(Box::new(flate2::read::GzEncoder::new(reader, level)))
        }
        #[cfg(feature = "zstd")]
        CompressionAlgorithm::Zstd => {
            let level = level.unwrap_or(zstd::DEFAULT_COMPRESSION_LEVEL);
            let encoder = zstd::stream::read::Encoder::new(reader, level).map_err(|source| CopyError::Codec {
                algorithm: CompressionAlgorithm::Zstd,
                source,
            })?;
            Ok(Box::new(encoder))
        }
        #[cfg(feature = "xz")]
        CompressionAlgorithm::Xz => {
            let level = level.unwrap_or(6).clamp(0, 9) as u32;
            Ok(Box::new(xz2::read::XzEncoder::new(reader, level)))
        }
        other => Err(CopyError::UnsupportedCompression(other)),
    }
}

/// Result of peeking at the start of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedCompression {
    /// `None` for uncompressed (or unrecognised) input.
    pub format: Option<CompressionAlgorithm>,
    pub decompressor: Option<Decompressor>,
}

impl DetectedCompression {
    pub fn is_compressed(&self) -> bool { self.format.is_some() }

    fn compressor_name(&self) -> &'static str { self.format.map_or(UNCOMPRESSED, |f| f.name()) }
}

/// Peek at up to [`MAX_PREFIX_LEN`] bytes to classify the stream's
/// compression. The peeked bytes are replayed in front of the rest of the
/// stream, so `stream` still yields every original byte.
pub fn detect_compression_step(stream: &mut SourceStream) -> Result<DetectedCompression> {
    let mut prefix = Vec::with_capacity(MAX_PREFIX_LEN);
    (&mut stream.reader)
        .take(MAX_PREFIX_LEN as u64)
        .read_to_end(&mut prefix)
        .map_err(|source| CopyError::DetectCompression {
            digest: digest_label(stream.info.digest.as_ref()),
            source,
        })?;

    let format = detect_compression(&prefix);
    if let (Some(expected), Some(found)) = (expected_compression(&stream.info.media_type), format) {
        if expected != found {
            debug!(
                digest = %digest_label(stream.info.digest.as_ref()),
                media_type = %stream.info.media_type,
                %expected,
                %found,
                "blob compression does not match its media type"
            );
        }
    }

    stream.wrap(|rest| Box::new(Cursor::new(prefix).chain(rest)));

    Ok(DetectedCompression {
        format,
        decompressor: format.map(|algorithm| Decompressor { algorithm }),
    })
}

/// State of the compression transform, kept until the sink is done.
///
/// Codec state lives inside the stream's reader and is released when the
/// stream is dropped, on every exit path.
#[derive(Debug, Clone, Copy)]
pub struct CompressionStep {
    plan:                CompressionPlan,
    src_compressor_name: &'static str,
}

/// Recompress, decompress or pass through `stream` as decided by
/// [`plan_compression`].
pub fn compression_step(
    stream: &mut SourceStream,
    can_modify_blob: bool,
    detected: &DetectedCompression,
    desired: LayerCompression,
    options: &CopyOptions,
) -> Result<CompressionStep> {
    let plan = plan_compression(can_modify_blob, detected.format, desired, options);
    let level = options.compression_level;

    match (plan.operation, plan.uploaded_algorithm) {
        (CompressionOperation::Compress, Some(target)) => {
            debug!(algorithm = %target, "compressing blob on the fly");
            stream.try_wrap(|r| compress(target, level, r))?;
        }
        (CompressionOperation::Recompress, Some(target)) => {
            let decompressor = detected
                .decompressor
                .ok_or(CopyError::UnsupportedCompression(target))?;
            debug!(from = %decompressor.algorithm(), to = %target, "recompressing blob on the fly");
            stream.try_wrap(|r| compress(target, level, decompressor.decompress(r)?))?;
        }
        (CompressionOperation::Decompress, _) => {
            let decompressor = detected.decompressor.ok_or_else(|| {
                CopyError::UnsupportedCompression(detected.format.unwrap_or(CompressionAlgorithm::Gzip))
            })?;
            debug!(algorithm = %decompressor.algorithm(), "blob will be decompressed");
            stream.try_wrap(|r| decompressor.decompress(r))?;
        }
        _ => debug!("using original blob without modification"),
    }

    if plan.operation.changes_blob() {
        stream.info.clear_content_identity();
    }

    Ok(CompressionStep {
        plan,
        src_compressor_name: detected.compressor_name(),
    })
}

impl CompressionStep {
    pub fn operation(&self) -> CompressionOperation { self.plan.operation }

    pub fn edit(&self) -> CompressionEdit {
        CompressionEdit {
            operation: self.plan.operation,
            algorithm: self.plan.uploaded_algorithm,
        }
    }

    fn uploaded_compressor_name(&self) -> &'static str {
        self.plan.uploaded_algorithm.map_or(UNCOMPRESSED, |a| a.name())
    }

    /// Record what this copy proved about the source and uploaded digests.
    ///
    /// Only call this when the source digest was verified. Nothing is
    /// recorded when the bytes were encrypted or decrypted.
    pub fn record_validated_digest_data(
        &self,
        cache: &dyn BlobInfoCache,
        uploaded: &Digest,
        source: Option<&Digest>,
        crypto_changed: bool,
    ) {
        if crypto_changed {
            return;
        }

        if let Some(source) = source {
            match self.plan.operation {
                CompressionOperation::Compress => cache.record_digest_uncompressed_pair(uploaded, source),
                CompressionOperation::Decompress => cache.record_digest_uncompressed_pair(source, uploaded),
                // One digest only, or two compressed ones.
                CompressionOperation::PreserveOriginal | CompressionOperation::Recompress => {}
            }
        }

        cache.record_digest_compressor_name(uploaded, self.uploaded_compressor_name());
        if let Some(source) = source {
            cache.record_digest_compressor_name(source, self.src_compressor_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use blobpipe_verify::DigestAlgorithm;

    use crate::data::BlobInfo;
    use crate::effects::cache::MemoryBlobInfoCache;

    fn stream_of(data: Vec<u8>) -> SourceStream {
        SourceStream::new(
            Box::new(Cursor::new(data.clone())),
            BlobInfo::new(Some(Digest::compute(DigestAlgorithm::Sha256, &data)), Some(data.len() as u64), ""),
        )
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn read_all(stream: &mut SourceStream) -> Vec<u8> {
        let mut out = Vec::new();
        stream.reader.read_to_end(&mut out).unwrap();
        out
    }

    /// Counts how many bytes were pulled from the inner reader.
    struct Counting<R> {
        inner: R,
        read:  std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl<R: Read> Read for Counting<R> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.read.fetch_add(n, std::sync::atomic::Ordering::SeqCst);
            Ok(n)
        }
    }

    #[test]
    fn detection_replays_peeked_bytes() {
        let data = gzip(b"layer contents");
        let mut stream = stream_of(data.clone());
        let detected = detect_compression_step(&mut stream).unwrap();

        assert_eq!(detected.format, Some(CompressionAlgorithm::Gzip));
        assert!(detected.decompressor.is_some());
        assert_eq!(read_all(&mut stream), data);
    }

    #[test]
    fn detection_reads_at_most_the_prefix() {
        let read = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut stream = SourceStream::new(
            Box::new(Counting {
                inner: Cursor::new(vec![0u8; 4096]),
                read:  read.clone(),
            }),
            BlobInfo::default(),
        );
        detect_compression_step(&mut stream).unwrap();
        assert_eq!(read.load(std::sync::atomic::Ordering::SeqCst), MAX_PREFIX_LEN);
    }

    #[test]
    fn detection_of_short_stream_is_uncompressed() {
        let mut stream = stream_of(vec![0x1F, 0x8B]);
        let detected = detect_compression_step(&mut stream).unwrap();

        assert_eq!(detected.format, None);
        assert!(detected.decompressor.is_none());
        assert_eq!(read_all(&mut stream), vec![0x1F, 0x8B]);
    }

    #[test]
    fn peek_failure_is_a_source_read_error() {
        struct Unreachable;

        impl Read for Unreachable {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset by peer"))
            }
        }

        let mut stream = SourceStream::new(Box::new(Unreachable), BlobInfo::new(None, None, ""));
        let err = detect_compression_step(&mut stream).unwrap_err();

        assert!(matches!(err, CopyError::DetectCompression { .. }), "{err}");
        assert!(err.to_string().starts_with("reading blob"), "{err}");
        assert!(err.to_string().contains("connection reset by peer"), "{err}");
    }

    #[test]
    fn compress_step_clears_identity_and_compresses() {
        let data = b"plain layer bytes".repeat(64);
        let mut stream = stream_of(data.clone());
        let detected = detect_compression_step(&mut stream).unwrap();
        let step = compression_step(
            &mut stream,
            true,
            &detected,
            LayerCompression::Compress,
            &CopyOptions::default(),
        )
        .unwrap();

        assert_eq!(step.operation(), CompressionOperation::Compress);
        assert_eq!(stream.info.digest, None);
        assert_eq!(stream.info.size, None);

        let compressed = read_all(&mut stream);
        assert!(compressed.starts_with(CompressionAlgorithm::Gzip.prefix()));
        let mut round = Vec::new();
        flate2::read::GzDecoder::new(&compressed[..]).read_to_end(&mut round).unwrap();
        assert_eq!(round, data);
    }

    #[test]
    fn decompress_step_yields_plain_bytes() {
        let mut stream = stream_of(gzip(b"inner"));
        let detected = detect_compression_step(&mut stream).unwrap();
        let step = compression_step(
            &mut stream,
            true,
            &detected,
            LayerCompression::Decompress,
            &CopyOptions::default(),
        )
        .unwrap();

        assert_eq!(step.edit().operation, CompressionOperation::Decompress);
        assert_eq!(step.edit().algorithm, None);
        assert_eq!(read_all(&mut stream), b"inner");
    }

    #[test]
    fn preserve_keeps_identity() {
        let data = gzip(b"inner");
        let mut stream = stream_of(data.clone());
        let declared = stream.info.digest.clone();
        let detected = detect_compression_step(&mut stream).unwrap();
        let step = compression_step(
            &mut stream,
            false,
            &detected,
            LayerCompression::Decompress,
            &CopyOptions::default(),
        )
        .unwrap();

        assert_eq!(step.operation(), CompressionOperation::PreserveOriginal);
        assert_eq!(step.edit().algorithm, Some(CompressionAlgorithm::Gzip));
        assert_eq!(stream.info.digest, declared);
        assert_eq!(read_all(&mut stream), data);
    }

    #[test]
    fn bzip2_cannot_be_decompressed() {
        let decompressor = Decompressor {
            algorithm: CompressionAlgorithm::Bzip2,
        };
        let result = decompressor.decompress(Box::new(Cursor::new(Vec::new())));
        assert!(matches!(
            result,
            Err(CopyError::UnsupportedCompression(CompressionAlgorithm::Bzip2))
        ));
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn recompress_gzip_to_zstd() {
        let mut stream = stream_of(gzip(b"recompressed payload"));
        let detected = detect_compression_step(&mut stream).unwrap();
        let options = CopyOptions::default().compression_format(CompressionAlgorithm::Zstd);
        let step = compression_step(&mut stream, true, &detected, LayerCompression::PreserveOriginal, &options)
            .unwrap();

        assert_eq!(step.operation(), CompressionOperation::Recompress);
        let out = read_all(&mut stream);
        assert!(out.starts_with(CompressionAlgorithm::Zstd.prefix()));
        assert_eq!(zstd::stream::decode_all(&out[..]).unwrap(), b"recompressed payload");
    }

    #[test]
    fn records_uncompressed_pair_after_compress() {
        let cache = MemoryBlobInfoCache::new();
        let source = Digest::compute(DigestAlgorithm::Sha256, b"plain");
        let uploaded = Digest::compute(DigestAlgorithm::Sha256, b"gzipped");
        let step = CompressionStep {
            plan:                CompressionPlan {
                operation:          CompressionOperation::Compress,
                uploaded_algorithm: Some(CompressionAlgorithm::Gzip),
            },
            src_compressor_name: UNCOMPRESSED,
        };

        step.record_validated_digest_data(&cache, &uploaded, Some(&source), false);

        assert_eq!(cache.uncompressed_digest(&uploaded), Some(source.clone()));
        assert_eq!(cache.compressor_name(&uploaded).as_deref(), Some("gzip"));
        assert_eq!(cache.compressor_name(&source).as_deref(), Some(UNCOMPRESSED));
    }

    #[test]
    fn records_nothing_for_crypto_changes() {
        let cache = MemoryBlobInfoCache::new();
        let uploaded = Digest::compute(DigestAlgorithm::Sha256, b"ciphertext");
        let step = CompressionStep {
            plan:                CompressionPlan {
                operation:          CompressionOperation::PreserveOriginal,
                uploaded_algorithm: None,
            },
            src_compressor_name: UNCOMPRESSED,
        };

        step.record_validated_digest_data(&cache, &uploaded, None, true);
        assert_eq!(cache.compressor_name(&uploaded), None);
    }
}
