/// Errors raised by the mixing engine.
///
/// Unreachable targets and exhausted time budgets are *not* errors; they
/// come back as normal results with `target_met = false` or
/// `early_termination = true` in the metrics.
#[derive(Debug, thiserror::Error)]
pub enum MixError {
    /// Malformed request; surfaced before any optimization is attempted.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Internal precondition violation (mismatched array lengths,
    /// all-zero volume vectors). Aborts the current call only.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Malformed color encoding, e.g. a hex string that does not parse.
    #[error("invalid color format: {0}")]
    Format(String),

    /// Spectral recovery did not converge. Always recovered internally
    /// via the LAB-average fallback; never crosses the public boundary.
    #[error("spectral recovery failed: {0}")]
    Spectral(String),
}

pub type Result<T> = std::result::Result<T, MixError>;
