use crate::data::CompressionAlgorithm;

/// Classify a stream by its leading bytes. `None` means uncompressed, or at
/// least nothing we recognise.
pub fn detect_compression(data: &[u8]) -> Option<CompressionAlgorithm> {
    CompressionAlgorithm::ALL
        .into_iter()
        .find(|algorithm| data.starts_with(algorithm.prefix()))
}

/// Compression implied by a layer media type, if it implies one.
pub fn expected_compression(media_type: &str) -> Option<CompressionAlgorithm> {
    match media_type {
        "application/vnd.oci.image.layer.v1.tar+gzip"
        | "application/vnd.oci.image.layer.nondistributable.v1.tar+gzip"
        | "application/vnd.docker.image.rootfs.diff.tar.gzip"
        | "application/vnd.docker.image.rootfs.foreign.diff.tar.gzip" => {
            Some(CompressionAlgorithm::Gzip)
        }
        "application/vnd.oci.image.layer.v1.tar+zstd"
        | "application/vnd.oci.image.layer.nondistributable.v1.tar+zstd" => {
            Some(CompressionAlgorithm::Zstd)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_gzip() {
        let gz_header = [0x1F, 0x8B, 0x08, 0x00];
        assert_eq!(detect_compression(&gz_header), Some(CompressionAlgorithm::Gzip));
    }

    #[test]
    fn detect_zstd() {
        let zstd_header = [0x28, 0xB5, 0x2F, 0xFD, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(detect_compression(&zstd_header), Some(CompressionAlgorithm::Zstd));
    }

    #[test]
    fn detect_xz() {
        let xz_header = [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00, 0x00, 0x00];
        assert_eq!(detect_compression(&xz_header), Some(CompressionAlgorithm::Xz));
    }

    #[test]
    fn detect_bzip2() {
        assert_eq!(detect_compression(b"BZh91AY&"), Some(CompressionAlgorithm::Bzip2));
    }

    #[test]
    fn detect_unknown() {
        let random_data = [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(detect_compression(&random_data), None);
    }

    #[test]
    fn detect_truncated_prefix() {
        // Two of the three gzip magic bytes are not enough.
        assert_eq!(detect_compression(&[0x1F, 0x8B]), None);
        assert_eq!(detect_compression(&[]), None);
    }

    #[test]
    fn expected_compression_by_media_type() {
        assert_eq!(
            expected_compression("application/vnd.oci.image.layer.v1.tar+gzip"),
            Some(CompressionAlgorithm::Gzip)
        );
        assert_eq!(
            expected_compression("application/vnd.oci.image.layer.v1.tar+zstd"),
            Some(CompressionAlgorithm::Zstd)
        );
        assert_eq!(expected_compression("application/vnd.oci.image.layer.v1.tar"), None);
        assert_eq!(expected_compression("application/vnd.oci.image.config.v1+json"), None);
    }
}
