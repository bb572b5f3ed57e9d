//! Error taxonomy shared by every layer of the crate.
//!
//! `ZkError` is `Clone` because a memoized initialisation (artifact fetch,
//! library load, algorithm init) delivers one outcome to every waiter that
//! joined it, failures included.

use thiserror::Error;

/// Result type for proving operations.
pub type ZkResult<T> = Result<T, ZkError>;

/// Message carried by [`ZkError::InvalidProof`]. Callers may branch on it.
pub const INVALID_PROOF_MESSAGE: &str = "invalid proof";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZkError {
    /// Bad codec input or cipher configuration. Never crosses the foreign boundary.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The artifact fetcher could not supply the requested file.
    #[error("artifact {backend}/{artifact} unavailable: {reason}")]
    ArtifactUnavailable {
        backend: String,
        artifact: String,
        reason: String,
    },

    /// No native library was built for this host.
    #[error("native library not built for OS/arch ({platform}/{arch}): {path} not found")]
    UnsupportedPlatform {
        platform: String,
        arch: String,
        path: String,
    },

    /// A native library exists but cannot be loaded or resolved on this host.
    #[error("native library not compatible with OS/arch ({platform}/{arch}): {reason}")]
    IncompatibleBinary {
        platform: String,
        arch: String,
        reason: String,
    },

    /// Malformed witness input or a failed witness computation.
    #[error("witness error: {0}")]
    Witness(String),

    /// The prover rejected the witness or returned nothing.
    #[error("prover error: {0}")]
    Prover(String),

    /// Backend plumbing failed (foreign init, worker task).
    #[error("backend error: {0}")]
    Backend(String),

    /// The proof payload is structurally malformed.
    #[error("verification error: {0}")]
    Verification(String),

    /// A well-formed proof failed the cryptographic check.
    #[error("{}", INVALID_PROOF_MESSAGE)]
    InvalidProof,

    /// Caller-supplied key, iv, ciphertext or offset is out of range.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ZkError {
    /// Whether retrying the same call (possibly with another fetcher) can help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ArtifactUnavailable { .. })
    }

    /// Whether the native backend is unusable on this host and callers should
    /// fall back to the in-process backend.
    pub fn is_platform_failure(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedPlatform { .. } | Self::IncompatibleBinary { .. }
        )
    }
}

impl From<tokio::task::JoinError> for ZkError {
    fn from(e: tokio::task::JoinError) -> Self {
        ZkError::Backend(format!("worker task failed: {}", e))
    }
}
