use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    /// Backend failure (connection, query, schema)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Stored data could not be (de)serialized
    #[error("Json conversion(Serde) error: {0}")]
    Serde(String),

    /// A row with the same primary key already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bad storage configuration
    #[error("Storage configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(db.message().to_string())
            }
            _ => Self::Storage(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}
