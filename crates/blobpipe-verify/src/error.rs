#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("invalid digest specification {0:?}")]
    InvalidDigest(String),

    #[error("invalid digest specification {digest}: unsupported digest algorithm {algorithm}")]
    UnsupportedAlgorithm { digest: String, algorithm: String },
}

pub type Result<T> = std::result::Result<T, VerificationError>;
