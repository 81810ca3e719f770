use crate::titer::Titer;

/// Errors surfaced by chart import and the canonical model.
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    /// Malformed legacy syntax: unbalanced parens, invalid JSON after the
    /// ACD1 rewrite, or bytes never matching any known format. Fatal for the
    /// whole import; the message carries the offending snippet or position.
    #[error("parse error: {0}")]
    Parse(String),

    /// Structurally parsed but semantically incomplete or inconsistent
    /// (missing section, titer-row count not matching the antigen count,
    /// unsupported representation requested). Fatal for the operation,
    /// sibling data stays intact.
    #[error("validation error: {0}")]
    Validation(String),

    /// A numeric accessor was called on a titer with no reading, or a merge
    /// input failed to supply a definite reading.
    #[error("invalid titer {titer}: {reason}")]
    InvalidTiter { titer: Titer, reason: String },

    /// The chart does not carry the requested data in the requested shape
    /// (e.g. sparse rows of a dense matrix). Recoverable; callers branch.
    #[error("not available: {0}")]
    NotAvailable(String),
}

impl ChartError {
    pub(crate) fn invalid_titer(titer: &Titer, reason: impl Into<String>) -> Self {
        ChartError::InvalidTiter {
            titer: titer.clone(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChartError>;
