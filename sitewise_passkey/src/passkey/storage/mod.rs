mod memory;
mod postgres;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::passkey::types::{ChallengeRecord, ChallengeType, PasskeyCredential};
use crate::storage::{DataStore, StorageError, validate_table_prefix};

pub use memory::{InMemoryChallengeRepository, InMemoryCredentialRepository};
pub(crate) use postgres::{PostgresChallengeRepository, PostgresCredentialRepository};
pub(crate) use sqlite::{SqliteChallengeRepository, SqliteCredentialRepository};

/// Persistence for one-time challenges.
///
/// Every time-dependent call receives `now` from the caller so that expiry is
/// decided by one clock.
#[async_trait]
pub trait ChallengeRepository: Send + Sync + 'static {
    /// Creates tables and indexes if they do not exist yet.
    async fn init(&self) -> Result<(), StorageError>;

    async fn insert(&self, record: &ChallengeRecord) -> Result<(), StorageError>;

    /// Newest record with `challenge_hash == hash`, `challenge_type == challenge_type`
    /// and `expires_at > now`.
    async fn find_latest_unexpired(
        &self,
        hash: &str,
        challenge_type: ChallengeType,
        now: DateTime<Utc>,
    ) -> Result<Option<ChallengeRecord>, StorageError>;

    /// Returns whether a row was actually removed.
    async fn delete(&self, id: &str) -> Result<bool, StorageError>;

    /// Deletes at most `limit` records with `expires_at < now`.
    async fn delete_expired(&self, now: DateTime<Utc>, limit: usize) -> Result<u64, StorageError>;

    /// Number of records from `origin_ip` created after `since`, counting no further than `limit`.
    async fn count_recent_by_ip(
        &self,
        origin_ip: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<usize, StorageError>;
}

/// Persistence for registered credentials.
#[async_trait]
pub trait CredentialRepository: Send + Sync + 'static {
    async fn init(&self) -> Result<(), StorageError>;

    /// Fails with `StorageError::Conflict` when the credential id exists.
    async fn insert(&self, credential: &PasskeyCredential) -> Result<(), StorageError>;

    async fn get(&self, credential_id: &str) -> Result<Option<PasskeyCredential>, StorageError>;

    /// Ordered by `last_used_at` descending.
    async fn list_by_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<PasskeyCredential>, StorageError>;

    async fn update_usage(
        &self,
        credential_id: &str,
        counter: u32,
        used_at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    async fn set_flagged(&self, credential_id: &str) -> Result<bool, StorageError>;

    async fn rename(&self, credential_id: &str, device_name: &str) -> Result<bool, StorageError>;

    async fn delete(&self, credential_id: &str) -> Result<bool, StorageError>;
}

pub(crate) fn challenges_table(prefix: &str) -> String {
    format!("{prefix}passkey_challenges")
}

pub(crate) fn credentials_table(prefix: &str) -> String {
    format!("{prefix}passkey_credentials")
}

/// Builds and initializes both repositories for the connected backend.
pub async fn open_repositories(
    store: &DataStore,
    table_prefix: &str,
) -> Result<(Arc<dyn ChallengeRepository>, Arc<dyn CredentialRepository>), StorageError> {
    validate_table_prefix(table_prefix)?;

    let (challenges, credentials): (Arc<dyn ChallengeRepository>, Arc<dyn CredentialRepository>) =
        match store {
            DataStore::Sqlite(pool) => (
                Arc::new(SqliteChallengeRepository::new(pool.clone(), table_prefix)),
                Arc::new(SqliteCredentialRepository::new(pool.clone(), table_prefix)),
            ),
            DataStore::Postgres(pool) => (
                Arc::new(PostgresChallengeRepository::new(pool.clone(), table_prefix)),
                Arc::new(PostgresCredentialRepository::new(pool.clone(), table_prefix)),
            ),
            DataStore::Memory => (
                Arc::new(InMemoryChallengeRepository::new()),
                Arc::new(InMemoryCredentialRepository::new()),
            ),
        };

    challenges.init().await?;
    credentials.init().await?;
    Ok((challenges, credentials))
}
