#![forbid(unsafe_code)]

use thiserror::Error;

pub type TufResult<T> = Result<T, TufError>;

/// Metadata-channel errors.
#[derive(Debug, Error)]
pub enum TufError {
    #[error("Network error: {0}")]
    Net(#[from] capstan_net::NetError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("trust root missing: {0}")]
    TrustRootMissing(String),

    #[error("metadata parse failed for {file}: {reason}")]
    MetadataParse { file: String, reason: String },

    #[error("metadata version rollback for {file}: cached {cached}, remote {remote}")]
    VersionRollback {
        file: String,
        cached: u64,
        remote: u64,
    },

    #[error("target not found in metadata: {0}")]
    TargetNotFound(String),

    #[error("hash mismatch for {target}: declared {declared}, computed {computed}")]
    HashMismatch {
        target: String,
        declared: String,
        computed: String,
    },

    #[error("length mismatch for {target}: declared {declared}, received {received}")]
    LengthMismatch {
        target: String,
        declared: u64,
        received: u64,
    },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}
