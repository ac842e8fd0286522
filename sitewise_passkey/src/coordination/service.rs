use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{PasskeyConfig, RateLimitPolicy};
use crate::passkey::{
    ChallengeRepository, ChallengeStore, CredentialRepository, CredentialStore, PasskeyError,
    RateLimiter, open_repositories,
};
use crate::storage::{DataStore, StorageConfig};
use crate::verifier::{HttpVerifierClient, Verifier, VerifierError};

/// Entry point for both ceremonies and credential management.
///
/// Holds no per-request state. Clone the `Arc` around it into request handlers.
pub struct PasskeyService {
    pub(super) config: PasskeyConfig,
    pub(super) challenges: ChallengeStore,
    pub(super) credentials: CredentialStore,
    pub(super) rate_limiter: RateLimiter,
    pub(super) verifier: Arc<dyn Verifier>,
}

impl PasskeyService {
    pub fn new(
        config: PasskeyConfig,
        challenge_repo: Arc<dyn ChallengeRepository>,
        credential_repo: Arc<dyn CredentialRepository>,
        verifier: Arc<dyn Verifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let challenges = ChallengeStore::new(
            challenge_repo.clone(),
            *config.encryption_key(),
            config.challenge_ttl,
            clock.clone(),
        );
        let credentials = CredentialStore::new(credential_repo, clock.clone());
        let rate_limiter = RateLimiter::new(challenge_repo, clock);

        Self {
            config,
            challenges,
            credentials,
            rate_limiter,
            verifier,
        }
    }

    /// Connects the configured data store, creates tables and wires the HTTP verifier.
    pub async fn init(config: PasskeyConfig, storage: &StorageConfig) -> Result<Self, PasskeyError> {
        let store = DataStore::connect(storage)
            .await
            .map_err(|e| PasskeyError::from(e).log())?;
        let (challenge_repo, credential_repo) = open_repositories(&store, &storage.table_prefix)
            .await
            .map_err(|e| PasskeyError::from(e).log())?;
        let verifier = HttpVerifierClient::from_config(&config)
            .map_err(|e| PasskeyError::Config(e.to_string()).log())?;

        tracing::info!(
            rp_id = %config.rp_id,
            verifier = %config.verifier_url,
            "Passkey service initialized"
        );

        Ok(Self::new(
            config,
            challenge_repo,
            credential_repo,
            Arc::new(verifier),
            Arc::new(SystemClock),
        ))
    }

    pub fn config(&self) -> &PasskeyConfig {
        &self.config
    }

    pub fn challenges(&self) -> &ChallengeStore {
        &self.challenges
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub(super) async fn enforce_rate_limit(
        &self,
        ceremony: &'static str,
        policy: RateLimitPolicy,
        origin_ip: Option<&str>,
    ) -> Result<(), PasskeyError> {
        if self
            .rate_limiter
            .is_limited(origin_ip, policy.max_attempts, policy.window)
            .await
        {
            tracing::warn!(
                event = "passkey_rate_limited",
                ceremony,
                client_ip = origin_ip.unwrap_or_default(),
                "Too many {} attempts",
                ceremony
            );
            return Err(PasskeyError::RateLimited {
                retry_after_secs: policy.window.num_seconds().max(0) as u64,
            });
        }
        Ok(())
    }
}

/// Logs the verifier failure by cause and collapses it for the caller.
pub(super) fn verification_failed(
    ceremony: &'static str,
    error: &VerifierError,
    origin_ip: Option<&str>,
) -> PasskeyError {
    if error.is_unavailable() {
        tracing::error!(
            event = "passkey_verifier_unreachable",
            ceremony,
            client_ip = origin_ip.unwrap_or_default(),
            "Verifier unavailable: {}",
            error
        );
    } else {
        tracing::warn!(
            event = "passkey_verification_failed",
            ceremony,
            client_ip = origin_ip.unwrap_or_default(),
            "Verification failed: {}",
            error
        );
    }
    PasskeyError::VerificationFailed
}
