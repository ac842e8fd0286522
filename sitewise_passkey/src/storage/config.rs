//! Data store selection and connection

use std::{env, str::FromStr};

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Postgres, Sqlite};

use super::errors::StorageError;

const DEFAULT_TABLE_PREFIX: &str = "sw_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    Sqlite,
    Postgres,
    Memory,
}

impl FromStr for StoreType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            t => Err(StorageError::Config(format!(
                "Unsupported store type: {t}. Supported types are 'sqlite', 'postgres' and 'memory'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub store_type: StoreType,
    pub url: String,
    pub table_prefix: String,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, StorageError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, StorageError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store_type: StoreType = lookup("GENERIC_DATA_STORE_TYPE")
            .ok_or_else(|| StorageError::Config("GENERIC_DATA_STORE_TYPE must be set".into()))?
            .parse()?;

        let url = match store_type {
            StoreType::Memory => lookup("GENERIC_DATA_STORE_URL").unwrap_or_default(),
            _ => lookup("GENERIC_DATA_STORE_URL")
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| StorageError::Config("GENERIC_DATA_STORE_URL must be set".into()))?,
        };

        let table_prefix = lookup("DB_TABLE_PREFIX").unwrap_or_else(|| DEFAULT_TABLE_PREFIX.into());
        validate_table_prefix(&table_prefix)?;

        Ok(Self {
            store_type,
            url,
            table_prefix,
        })
    }
}

/// Table names are interpolated into SQL, so the prefix is restricted to identifier characters.
pub(crate) fn validate_table_prefix(prefix: &str) -> Result<(), StorageError> {
    if prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(())
    } else {
        Err(StorageError::Config(format!(
            "Invalid DB_TABLE_PREFIX '{prefix}': only ASCII letters, digits and '_' are allowed"
        )))
    }
}

/// A connected backend. Repositories pick their implementation from it.
#[derive(Debug, Clone)]
pub enum DataStore {
    Sqlite(Pool<Sqlite>),
    Postgres(Pool<Postgres>),
    Memory,
}

impl DataStore {
    pub async fn connect(config: &StorageConfig) -> Result<Self, StorageError> {
        tracing::info!(
            "Initializing data store with type: {:?}, url: {}",
            config.store_type,
            config.url
        );

        let store = match config.store_type {
            StoreType::Sqlite => {
                let opts = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
                // Every connection to an in-memory database sees its own database.
                let pool = if config.url.contains(":memory:") {
                    SqlitePoolOptions::new()
                        .max_connections(1)
                        .idle_timeout(None)
                        .max_lifetime(None)
                        .connect_with(opts)
                        .await?
                } else {
                    SqlitePoolOptions::new().connect_with(opts).await?
                };
                Self::Sqlite(pool)
            }
            StoreType::Postgres => Self::Postgres(sqlx::PgPool::connect(&config.url).await?),
            StoreType::Memory => Self::Memory,
        };

        tracing::info!("Connected to data store: type={:?}", config.store_type);
        Ok(store)
    }

    pub fn as_sqlite(&self) -> Option<&Pool<Sqlite>> {
        match self {
            Self::Sqlite(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn as_postgres(&self) -> Option<&Pool<Postgres>> {
        match self {
            Self::Postgres(pool) => Some(pool),
            _ => None,
        }
    }
}

pub(crate) fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| sqlx::Error::Decode(format!("invalid timestamp: {millis}").into()))
}
