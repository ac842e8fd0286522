//! Axum routes for the sitewise-passkey ceremonies.
//!
//! The host application supplies a [`SessionBridge`] for user lookup and
//! session issuance, then mounts [`passkey_router`] wherever it likes.

mod bridge;
mod client_ip;
mod error;
mod passkey;
mod session;

#[cfg(test)]
mod test_utils;

pub use bridge::{SessionBridge, SessionGrant, SessionUser};
pub use error::ErrorResponse;
pub use passkey::passkey_router;
pub use session::{AuthUser, PasskeyState};

pub use sitewise_passkey::{PasskeyConfig, PasskeyService, StorageConfig, spawn_challenge_sweeper};
