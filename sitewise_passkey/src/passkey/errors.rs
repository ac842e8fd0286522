use thiserror::Error;

use crate::storage::StorageError;
use crate::utils::UtilError;

/// Errors surfaced by the passkey ceremonies and credential management.
///
/// Internal causes (which lookup failed, whether the verifier rejected or was
/// unreachable) are logged where they happen and collapse into these variants,
/// so callers never learn more than the taxonomy below.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PasskeyError {
    /// Too many challenge requests from one IP within the rate-limit window
    #[error("Too many attempts. Please wait and try again")]
    RateLimited { retry_after_secs: u64 },

    /// The submitted challenge is unknown, expired, already used or bound to another user
    #[error("Invalid or expired challenge")]
    InvalidOrExpiredChallenge,

    /// The asserted credential is not registered
    #[error("Unknown credential")]
    UnknownCredential,

    /// The verifier rejected the ceremony or could not be reached
    #[error("Verification failed")]
    VerificationFailed,

    /// A credential with the same id is already registered
    #[error("Credential already registered")]
    DuplicateCredential,

    /// Malformed client payload or invalid device name
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The caller does not own the credential
    #[error("Unauthorized")]
    Unauthorized,

    /// The credential does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persisting ceremony state failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid or unsafe configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from utility operations
    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),
}

impl PasskeyError {
    /// Log the error and return self
    pub fn log(self) -> Self {
        match &self {
            Self::RateLimited { retry_after_secs } => {
                tracing::warn!("Rate limited, retry after {}s", retry_after_secs)
            }
            Self::InvalidOrExpiredChallenge => tracing::warn!("Invalid or expired challenge"),
            Self::UnknownCredential => tracing::warn!("Unknown credential"),
            Self::VerificationFailed => tracing::warn!("Verification failed"),
            Self::DuplicateCredential => tracing::warn!("Credential already registered"),
            Self::InvalidRequest(msg) => tracing::debug!("Invalid request: {}", msg),
            Self::Unauthorized => tracing::warn!("Unauthorized credential access"),
            Self::NotFound(msg) => tracing::debug!("Not found: {}", msg),
            Self::Storage(msg) => tracing::error!("Storage error: {}", msg),
            Self::Config(msg) => tracing::error!("Configuration error: {}", msg),
            Self::Utils(err) => tracing::error!("Utils error: {}", err),
        }
        self
    }
}

impl From<StorageError> for PasskeyError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict(_) => Self::DuplicateCredential,
            other => Self::Storage(other.to_string()),
        }
    }
}
