use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{ChallengeRepository, CredentialRepository};
use crate::passkey::types::{ChallengeRecord, ChallengeType, PasskeyCredential};
use crate::storage::StorageError;

/// Process-local challenge storage for tests and single-instance development.
#[derive(Debug, Default)]
pub struct InMemoryChallengeRepository {
    entries: Mutex<HashMap<String, ChallengeRecord>>,
}

impl InMemoryChallengeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// All records, oldest first.
    pub async fn records(&self) -> Vec<ChallengeRecord> {
        let mut records: Vec<_> = self.entries.lock().await.values().cloned().collect();
        records.sort_by_key(|r| r.created_at);
        records
    }
}

#[async_trait]
impl ChallengeRepository for InMemoryChallengeRepository {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn insert(&self, record: &ChallengeRecord) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(&record.id) {
            return Err(StorageError::Conflict(format!(
                "challenge {} already exists",
                record.id
            )));
        }
        entries.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn find_latest_unexpired(
        &self,
        hash: &str,
        challenge_type: ChallengeType,
        now: DateTime<Utc>,
    ) -> Result<Option<ChallengeRecord>, StorageError> {
        let entries = self.entries.lock().await;
        Ok(entries
            .values()
            .filter(|r| {
                r.challenge_hash == hash && r.challenge_type == challenge_type && r.expires_at > now
            })
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.entries.lock().await.remove(id).is_some())
    }

    async fn delete_expired(&self, now: DateTime<Utc>, limit: usize) -> Result<u64, StorageError> {
        let mut entries = self.entries.lock().await;
        let expired: Vec<String> = entries
            .values()
            .filter(|r| r.expires_at < now)
            .take(limit)
            .map(|r| r.id.clone())
            .collect();
        for id in &expired {
            entries.remove(id);
        }
        Ok(expired.len() as u64)
    }

    async fn count_recent_by_ip(
        &self,
        origin_ip: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<usize, StorageError> {
        let entries = self.entries.lock().await;
        Ok(entries
            .values()
            .filter(|r| r.origin_ip.as_deref() == Some(origin_ip) && r.created_at > since)
            .take(limit)
            .count())
    }
}

/// Process-local credential storage for tests and single-instance development.
#[derive(Debug, Default)]
pub struct InMemoryCredentialRepository {
    entries: Mutex<HashMap<String, PasskeyCredential>>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn insert(&self, credential: &PasskeyCredential) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(&credential.credential_id) {
            return Err(StorageError::Conflict(format!(
                "credential {} already exists",
                credential.credential_id
            )));
        }
        entries.insert(credential.credential_id.clone(), credential.clone());
        Ok(())
    }

    async fn get(&self, credential_id: &str) -> Result<Option<PasskeyCredential>, StorageError> {
        Ok(self.entries.lock().await.get(credential_id).cloned())
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<PasskeyCredential>, StorageError> {
        let entries = self.entries.lock().await;
        let mut credentials: Vec<_> = entries
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        credentials.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
        credentials.truncate(limit);
        Ok(credentials)
    }

    async fn update_usage(
        &self,
        credential_id: &str,
        counter: u32,
        used_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut entries = self.entries.lock().await;
        Ok(match entries.get_mut(credential_id) {
            Some(credential) => {
                credential.counter = counter;
                credential.last_used_at = used_at;
                true
            }
            None => false,
        })
    }

    async fn set_flagged(&self, credential_id: &str) -> Result<bool, StorageError> {
        let mut entries = self.entries.lock().await;
        Ok(match entries.get_mut(credential_id) {
            Some(credential) => {
                credential.flagged = true;
                true
            }
            None => false,
        })
    }

    async fn rename(&self, credential_id: &str, device_name: &str) -> Result<bool, StorageError> {
        let mut entries = self.entries.lock().await;
        Ok(match entries.get_mut(credential_id) {
            Some(credential) => {
                credential.device_name = device_name.to_string();
                true
            }
            None => false,
        })
    }

    async fn delete(&self, credential_id: &str) -> Result<bool, StorageError> {
        Ok(self.entries.lock().await.remove(credential_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_challenge, sample_credential};
    use chrono::Duration;

    #[tokio::test]
    async fn test_find_latest_prefers_newest_unexpired() {
        // Given two records with the same hash, the newer one created later
        let repo = InMemoryChallengeRepository::new();
        let now = Utc::now();
        let older = sample_challenge("a", "h", ChallengeType::Registration, now);
        let newer = sample_challenge("b", "h", ChallengeType::Registration, now + Duration::seconds(1));
        repo.insert(&older).await.unwrap();
        repo.insert(&newer).await.unwrap();

        // When looking up by hash
        let found = repo
            .find_latest_unexpired("h", ChallengeType::Registration, now + Duration::seconds(2))
            .await
            .unwrap();

        // Then the newest wins
        assert_eq!(found.unwrap().id, "b");
    }

    #[tokio::test]
    async fn test_find_latest_respects_type_and_expiry() {
        let repo = InMemoryChallengeRepository::new();
        let now = Utc::now();
        let record = sample_challenge("a", "h", ChallengeType::Registration, now);
        repo.insert(&record).await.unwrap();

        let wrong_type = repo
            .find_latest_unexpired("h", ChallengeType::Authentication, now)
            .await
            .unwrap();
        let at_expiry = repo
            .find_latest_unexpired("h", ChallengeType::Registration, record.expires_at)
            .await
            .unwrap();

        assert!(wrong_type.is_none());
        assert!(at_expiry.is_none());
    }

    #[tokio::test]
    async fn test_delete_reports_whether_removed() {
        let repo = InMemoryChallengeRepository::new();
        let record = sample_challenge("a", "h", ChallengeType::Registration, Utc::now());
        repo.insert(&record).await.unwrap();

        assert!(repo.delete("a").await.unwrap());
        assert!(!repo.delete("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_credential_insert_conflict() {
        let repo = InMemoryCredentialRepository::new();
        let credential = sample_credential("cred-1", "u1", 0);
        repo.insert(&credential).await.unwrap();

        let result = repo.insert(&credential).await;

        assert!(matches!(result, Err(StorageError::Conflict(_))));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_list_by_user_orders_and_limits() {
        let repo = InMemoryCredentialRepository::new();
        let now = Utc::now();
        for i in 0..3 {
            let mut credential = sample_credential(&format!("cred-{i}"), "u1", 0);
            credential.last_used_at = now + Duration::seconds(i);
            repo.insert(&credential).await.unwrap();
        }
        repo.insert(&sample_credential("other", "u2", 0))
            .await
            .unwrap();

        let listed = repo.list_by_user("u1", 2).await.unwrap();

        let ids: Vec<_> = listed.iter().map(|c| c.credential_id.as_str()).collect();
        assert_eq!(ids, vec!["cred-2", "cred-1"]);
    }
}
