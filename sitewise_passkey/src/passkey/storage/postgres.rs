use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Pool, Postgres, Row};

use super::{ChallengeRepository, CredentialRepository, challenges_table, credentials_table};
use crate::passkey::types::{ChallengeRecord, ChallengeType, DeviceType, PasskeyCredential};
use crate::storage::StorageError;

pub(crate) struct PostgresChallengeRepository {
    pool: Pool<Postgres>,
    table: String,
}

impl PostgresChallengeRepository {
    pub(crate) fn new(pool: Pool<Postgres>, prefix: &str) -> Self {
        Self {
            pool,
            table: challenges_table(prefix),
        }
    }
}

#[async_trait]
impl ChallengeRepository for PostgresChallengeRepository {
    async fn init(&self) -> Result<(), StorageError> {
        let table = self.table.as_str();

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY NOT NULL,
                challenge_hash TEXT NOT NULL,
                challenge TEXT NOT NULL,
                challenge_type TEXT NOT NULL,
                user_id TEXT,
                ip_address TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_hash ON {table}(challenge_hash, challenge_type)"
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_ip_created ON {table}(ip_address, created_at)"
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_expires ON {table}(expires_at)"
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert(&self, record: &ChallengeRecord) -> Result<(), StorageError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {}
            (id, challenge_hash, challenge, challenge_type, user_id, ip_address, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
            self.table
        ))
        .bind(&record.id)
        .bind(&record.challenge_hash)
        .bind(&record.encrypted_challenge)
        .bind(record.challenge_type.as_str())
        .bind(&record.user_id)
        .bind(&record.origin_ip)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_latest_unexpired(
        &self,
        hash: &str,
        challenge_type: ChallengeType,
        now: DateTime<Utc>,
    ) -> Result<Option<ChallengeRecord>, StorageError> {
        let record = sqlx::query_as::<_, ChallengeRecord>(&format!(
            r#"
            SELECT * FROM {}
            WHERE challenge_hash = $1 AND challenge_type = $2 AND expires_at > $3
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            self.table
        ))
        .bind(hash)
        .bind(challenge_type.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", self.table))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, now: DateTime<Utc>, limit: usize) -> Result<u64, StorageError> {
        let table = self.table.as_str();
        let result = sqlx::query(&format!(
            r#"
            DELETE FROM {table} WHERE id IN (
                SELECT id FROM {table} WHERE expires_at < $1 LIMIT $2
            )
            "#
        ))
        .bind(now)
        .bind(limit as i64)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_recent_by_ip(
        &self,
        origin_ip: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<usize, StorageError> {
        let count: i64 = sqlx::query_scalar(&format!(
            r#"
            SELECT COUNT(*) FROM (
                SELECT 1 FROM {} WHERE ip_address = $1 AND created_at > $2 LIMIT $3
            ) AS recent
            "#,
            self.table
        ))
        .bind(origin_ip)
        .bind(since)
        .bind(limit as i64)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as usize)
    }
}

pub(crate) struct PostgresCredentialRepository {
    pool: Pool<Postgres>,
    table: String,
}

impl PostgresCredentialRepository {
    pub(crate) fn new(pool: Pool<Postgres>, prefix: &str) -> Self {
        Self {
            pool,
            table: credentials_table(prefix),
        }
    }
}

#[async_trait]
impl CredentialRepository for PostgresCredentialRepository {
    async fn init(&self) -> Result<(), StorageError> {
        let table = self.table.as_str();

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                credential_id TEXT PRIMARY KEY NOT NULL,
                user_id TEXT NOT NULL,
                public_key TEXT NOT NULL,
                counter BIGINT NOT NULL DEFAULT 0,
                device_name TEXT NOT NULL,
                device_type TEXT NOT NULL,
                transports TEXT NOT NULL,
                backed_up BOOLEAN NOT NULL DEFAULT FALSE,
                aaguid TEXT NOT NULL DEFAULT '',
                flagged BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL,
                last_used_at TIMESTAMPTZ NOT NULL
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_user_id ON {table}(user_id, last_used_at)"
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert(&self, credential: &PasskeyCredential) -> Result<(), StorageError> {
        let transports = serde_json::to_string(&credential.transports)?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {}
            (credential_id, user_id, public_key, counter, device_name, device_type, transports,
             backed_up, aaguid, flagged, created_at, last_used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
            self.table
        ))
        .bind(&credential.credential_id)
        .bind(&credential.user_id)
        .bind(&credential.public_key)
        .bind(i64::from(credential.counter))
        .bind(&credential.device_name)
        .bind(credential.device_type.as_str())
        .bind(transports)
        .bind(credential.backed_up)
        .bind(&credential.aaguid)
        .bind(credential.flagged)
        .bind(credential.created_at)
        .bind(credential.last_used_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, credential_id: &str) -> Result<Option<PasskeyCredential>, StorageError> {
        let credential = sqlx::query_as::<_, PasskeyCredential>(&format!(
            "SELECT * FROM {} WHERE credential_id = $1",
            self.table
        ))
        .bind(credential_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<PasskeyCredential>, StorageError> {
        let credentials = sqlx::query_as::<_, PasskeyCredential>(&format!(
            "SELECT * FROM {} WHERE user_id = $1 ORDER BY last_used_at DESC LIMIT $2",
            self.table
        ))
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(credentials)
    }

    async fn update_usage(
        &self,
        credential_id: &str,
        counter: u32,
        used_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET counter = $1, last_used_at = $2 WHERE credential_id = $3",
            self.table
        ))
        .bind(i64::from(counter))
        .bind(used_at)
        .bind(credential_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_flagged(&self, credential_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET flagged = TRUE WHERE credential_id = $1",
            self.table
        ))
        .bind(credential_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn rename(&self, credential_id: &str, device_name: &str) -> Result<bool, StorageError> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET device_name = $1 WHERE credential_id = $2",
            self.table
        ))
        .bind(device_name)
        .bind(credential_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, credential_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE credential_id = $1",
            self.table
        ))
        .bind(credential_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl<'r> FromRow<'r, PgRow> for ChallengeRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let challenge_type: String = row.try_get("challenge_type")?;

        Ok(ChallengeRecord {
            id: row.try_get("id")?,
            challenge_hash: row.try_get("challenge_hash")?,
            encrypted_challenge: row.try_get("challenge")?,
            challenge_type: challenge_type
                .parse::<ChallengeType>()
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            user_id: row.try_get("user_id")?,
            origin_ip: row.try_get("ip_address")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for PasskeyCredential {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let counter: i64 = row.try_get("counter")?;
        let device_type: String = row.try_get("device_type")?;
        let transports: String = row.try_get("transports")?;

        Ok(PasskeyCredential {
            credential_id: row.try_get("credential_id")?,
            user_id: row.try_get("user_id")?,
            public_key: row.try_get("public_key")?,
            counter: counter.clamp(0, i64::from(u32::MAX)) as u32,
            device_name: row.try_get("device_name")?,
            device_type: device_type
                .parse::<DeviceType>()
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            transports: serde_json::from_str(&transports)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            backed_up: row.try_get("backed_up")?,
            aaguid: row.try_get("aaguid")?,
            flagged: row.try_get("flagged")?,
            created_at: row.try_get("created_at")?,
            last_used_at: row.try_get("last_used_at")?,
        })
    }
}
