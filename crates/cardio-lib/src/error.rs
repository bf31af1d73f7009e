use thiserror::Error;

/// Errors surfaced by the signal-processing stages.
///
/// Data-quality problems (too few qualifying sequences, no coherent bins)
/// are not errors; the BRS results report them through `brs: None`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CardioError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("spectral transform failed: {0}")]
    Fft(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CardioError>;

impl CardioError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CardioError::InvalidArgument(msg.into())
    }
}

/// Fails with `InvalidArgument` unless `rr` and `sbp` are beat-aligned.
pub(crate) fn ensure_aligned(rr: &[f64], sbp: &[f64]) -> Result<()> {
    if rr.len() != sbp.len() {
        return Err(CardioError::invalid(format!(
            "RR and SBP series must be beat-aligned (got {} RR vs {} SBP values)",
            rr.len(),
            sbp.len()
        )));
    }
    Ok(())
}

pub(crate) fn ensure_sample_rate(fs: f64) -> Result<()> {
    if !(fs.is_finite() && fs > 0.0) {
        return Err(CardioError::invalid(format!(
            "sample rate must be positive, got {fs}"
        )));
    }
    Ok(())
}
