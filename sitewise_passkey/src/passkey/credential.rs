use std::sync::Arc;

use super::errors::PasskeyError;
use super::storage::CredentialRepository;
use super::types::{DeviceMetadata, PasskeyCredential};
use crate::clock::Clock;
use crate::storage::StorageError;

const MAX_CREDENTIALS_PER_LIST: usize = 100;

/// Registry of passkeys. Lookups fail closed: a storage error reads as "absent".
pub struct CredentialStore {
    repo: Arc<dyn CredentialRepository>,
    clock: Arc<dyn Clock>,
}

impl CredentialStore {
    pub(crate) fn new(repo: Arc<dyn CredentialRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub async fn create(
        &self,
        user_id: &str,
        credential_id: &str,
        public_key: &str,
        counter: u32,
        metadata: DeviceMetadata,
    ) -> Result<PasskeyCredential, PasskeyError> {
        let now = self.clock.now();
        let credential = PasskeyCredential {
            credential_id: credential_id.to_string(),
            user_id: user_id.to_string(),
            public_key: public_key.to_string(),
            counter,
            device_name: metadata.device_name,
            device_type: metadata.device_type,
            transports: metadata.transports,
            backed_up: metadata.backed_up,
            aaguid: metadata.aaguid,
            flagged: false,
            created_at: now,
            last_used_at: now,
        };

        match self.repo.insert(&credential).await {
            Ok(()) => Ok(credential),
            Err(StorageError::Conflict(_)) => Err(PasskeyError::DuplicateCredential),
            Err(e) => {
                tracing::error!("Failed to store credential: {}", e);
                Err(PasskeyError::Storage(e.to_string()))
            }
        }
    }

    pub async fn find_by_id(&self, credential_id: &str) -> Option<PasskeyCredential> {
        self.repo.get(credential_id).await.unwrap_or_else(|e| {
            tracing::warn!("Credential lookup failed: {}", e);
            None
        })
    }

    /// Most recently used first, at most 100.
    pub async fn list_by_user(&self, user_id: &str) -> Vec<PasskeyCredential> {
        self.repo
            .list_by_user(user_id, MAX_CREDENTIALS_PER_LIST)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Credential listing failed: {}", e);
                Vec::new()
            })
    }

    pub async fn record_successful_use(
        &self,
        credential_id: &str,
        new_counter: u32,
    ) -> Result<(), PasskeyError> {
        match self
            .repo
            .update_usage(credential_id, new_counter, self.clock.now())
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(PasskeyError::NotFound(format!(
                "credential {credential_id}"
            ))),
            Err(e) => Err(PasskeyError::Storage(e.to_string())),
        }
    }

    /// Marks the credential for review. Flagged credentials keep working.
    pub async fn flag(&self, credential_id: &str) -> Result<(), PasskeyError> {
        self.repo
            .set_flagged(credential_id)
            .await
            .map(|_| ())
            .map_err(|e| PasskeyError::Storage(e.to_string()))
    }

    pub async fn rename(&self, credential_id: &str, device_name: &str) -> Result<bool, PasskeyError> {
        self.repo
            .rename(credential_id, device_name)
            .await
            .map_err(|e| PasskeyError::Storage(e.to_string()))
    }

    pub async fn delete(&self, credential_id: &str) -> Result<bool, PasskeyError> {
        self.repo
            .delete(credential_id)
            .await
            .map_err(|e| PasskeyError::Storage(e.to_string()))
    }
}
