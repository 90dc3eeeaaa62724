use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, BeatsError>;

/// Errors raised by the fallible (I/O and construction) paths of the
/// service. Pure verification never produces these — invalid proofs are
/// reported as `valid: false` with a reason, not as errors.
#[derive(Debug, Error)]
pub enum BeatsError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("publish not finalized after {0} ms")]
    PublishTimeout(u64),

    #[error("memo rejected: {0}")]
    Memo(String),

    #[error("anchor construction failed: {0}")]
    Anchor(String),

    #[error("signer error: {0}")]
    Signer(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl BeatsError {
    /// True for conditions callers should treat as transient (HTTP 503).
    pub fn is_unavailable(&self) -> bool {
        matches!(self, BeatsError::Unavailable(_))
    }
}
