mod config;
mod errors;

pub use config::{DataStore, StorageConfig, StoreType};
pub use errors::StorageError;

pub(crate) use config::{millis_to_datetime, validate_table_prefix};
