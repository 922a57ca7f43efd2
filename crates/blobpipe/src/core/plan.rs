use crate::data::{CompressionAlgorithm, CompressionOperation, CopyOptions, LayerCompression};

/// What the compression stage will do to a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPlan {
    pub operation: CompressionOperation,

    /// Compression of the bytes handed to the sink.
    pub uploaded_algorithm: Option<CompressionAlgorithm>,
}

/// Decide how to treat a blob's compression.
///
/// `can_modify_blob` must already be false for config blobs and for blobs
/// still encrypted at this point. Rules are checked in order; the first one
/// that applies wins:
///
/// 1. the destination wants compression and the input is uncompressed:
///    compress with the configured format (gzip by default);
/// 2. a format is configured and the input uses a different one:
///    recompress into the configured format;
/// 3. the destination wants uncompressed layers: decompress;
/// 4. otherwise keep the blob as it is.
///
/// Rules that need to decode the input only apply when a codec for the
/// detected format is available.
pub fn plan_compression(
    can_modify_blob: bool,
    detected: Option<CompressionAlgorithm>,
    desired: LayerCompression,
    options: &CopyOptions,
) -> CompressionPlan {
    let preserve = CompressionPlan {
        operation:          CompressionOperation::PreserveOriginal,
        uploaded_algorithm: detected,
    };
    if !can_modify_blob {
        return preserve;
    }

    match detected {
        None if desired == LayerCompression::Compress => CompressionPlan {
            operation:          CompressionOperation::Compress,
            uploaded_algorithm: Some(options.compress_with()),
        },
        Some(found) if found.has_codec() => match options.compression_format {
            Some(target) if target != found => CompressionPlan {
                operation:          CompressionOperation::Recompress,
                uploaded_algorithm: Some(target),
            },
            _ if desired == LayerCompression::Decompress => CompressionPlan {
                operation:          CompressionOperation::Decompress,
                uploaded_algorithm: None,
            },
            _ => preserve,
        },
        _ => preserve,
    }
}
