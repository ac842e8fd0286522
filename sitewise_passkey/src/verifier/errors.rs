use thiserror::Error;

/// Code the verifier uses when the reported signature counter went backwards.
pub(crate) const COUNTER_ERROR_CODE: &str = "COUNTER_ERROR";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifierError {
    /// The verifier answered and refused the ceremony
    #[error("Verifier rejected the ceremony (status {status}): {message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The verifier could not be reached
    #[error("Verifier unreachable: {0}")]
    Unreachable(String),

    /// The verifier did not answer in time
    #[error("Verifier timed out")]
    Timeout,

    /// The verifier answered with something that is not the expected envelope
    #[error("Malformed verifier response: {0}")]
    Protocol(String),
}

impl VerifierError {
    pub fn is_counter_error(&self) -> bool {
        matches!(self, Self::Rejected { code: Some(code), .. } if code == COUNTER_ERROR_CODE)
    }

    /// Transport-level failures, as opposed to a verdict from the verifier.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout)
    }
}

impl From<reqwest::Error> for VerifierError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}
