use std::sync::Arc;

use chrono::Duration;
use subtle::ConstantTimeEq;

use super::cipher::ChallengeCipher;
use super::errors::PasskeyError;
use super::storage::ChallengeRepository;
use super::types::{ChallengeRecord, ChallengeType};
use crate::clock::Clock;
use crate::storage::StorageError;
use crate::utils::{UtilError, sha256_hex};

/// Why a consume attempt did not yield a record. Logged, never returned to callers.
#[derive(Debug)]
enum ChallengeMiss {
    NotFound,
    Decrypt(UtilError),
    Mismatch,
    AlreadyConsumed,
    Storage(StorageError),
}

/// Issues, consumes and reaps one-time ceremony challenges.
pub struct ChallengeStore {
    repo: Arc<dyn ChallengeRepository>,
    cipher: ChallengeCipher,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ChallengeStore {
    pub(crate) fn new(
        repo: Arc<dyn ChallengeRepository>,
        encryption_key: [u8; 32],
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            cipher: ChallengeCipher::new(encryption_key),
            ttl,
            clock,
        }
    }

    /// Persists `raw_challenge` hashed and encrypted, expiring after the configured TTL.
    pub async fn issue(
        &self,
        raw_challenge: &str,
        challenge_type: ChallengeType,
        user_id: Option<&str>,
        origin_ip: Option<&str>,
    ) -> Result<ChallengeRecord, PasskeyError> {
        let now = self.clock.now();
        let record = ChallengeRecord {
            id: uuid::Uuid::new_v4().to_string(),
            challenge_hash: sha256_hex(raw_challenge.as_bytes()),
            encrypted_challenge: self.cipher.encrypt(raw_challenge.as_bytes())?,
            challenge_type,
            user_id: user_id.map(str::to_string),
            origin_ip: origin_ip.filter(|ip| !ip.is_empty()).map(str::to_string),
            created_at: now,
            expires_at: now + self.ttl,
        };

        self.repo.insert(&record).await.map_err(|e| {
            tracing::error!("Failed to store {} challenge: {}", challenge_type, e);
            PasskeyError::Storage(e.to_string())
        })?;

        tracing::debug!(
            challenge_id = %record.id,
            challenge_type = %challenge_type,
            "Issued challenge"
        );
        Ok(record)
    }

    /// Finds, checks and deletes the challenge in one step.
    ///
    /// Returns `None` for every failure. Of two concurrent calls with the same
    /// value at most one gets the record.
    pub async fn consume(
        &self,
        raw_challenge: &str,
        challenge_type: ChallengeType,
    ) -> Option<ChallengeRecord> {
        match self.try_consume(raw_challenge, challenge_type).await {
            Ok(record) => Some(record),
            Err(ChallengeMiss::NotFound) => {
                tracing::debug!("No unexpired {} challenge matches", challenge_type);
                None
            }
            Err(ChallengeMiss::AlreadyConsumed) => {
                tracing::debug!("{} challenge was consumed concurrently", challenge_type);
                None
            }
            Err(ChallengeMiss::Mismatch) => {
                tracing::warn!("Stored {} challenge does not match its hash", challenge_type);
                None
            }
            Err(ChallengeMiss::Decrypt(e)) => {
                tracing::warn!("Failed to decrypt stored {} challenge: {}", challenge_type, e);
                None
            }
            Err(ChallengeMiss::Storage(e)) => {
                tracing::warn!("Challenge lookup failed: {}", e);
                None
            }
        }
    }

    async fn try_consume(
        &self,
        raw_challenge: &str,
        challenge_type: ChallengeType,
    ) -> Result<ChallengeRecord, ChallengeMiss> {
        let hash = sha256_hex(raw_challenge.as_bytes());
        let record = self
            .repo
            .find_latest_unexpired(&hash, challenge_type, self.clock.now())
            .await
            .map_err(ChallengeMiss::Storage)?
            .ok_or(ChallengeMiss::NotFound)?;

        let stored = self
            .cipher
            .decrypt(&record.encrypted_challenge)
            .map_err(ChallengeMiss::Decrypt)?;
        if !bool::from(stored.as_slice().ct_eq(raw_challenge.as_bytes())) {
            return Err(ChallengeMiss::Mismatch);
        }

        if !self
            .repo
            .delete(&record.id)
            .await
            .map_err(ChallengeMiss::Storage)?
        {
            return Err(ChallengeMiss::AlreadyConsumed);
        }

        Ok(record)
    }

    /// Deletes up to `batch_limit` expired challenges. Storage errors count as zero.
    pub async fn sweep_expired(&self, batch_limit: usize) -> u64 {
        match self
            .repo
            .delete_expired(self.clock.now(), batch_limit)
            .await
        {
            Ok(count) => {
                if count > 0 {
                    tracing::debug!("Swept {} expired challenges", count);
                }
                count
            }
            Err(e) => {
                tracing::warn!("Challenge sweep failed: {}", e);
                0
            }
        }
    }
}
