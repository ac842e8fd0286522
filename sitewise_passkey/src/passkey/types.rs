use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::UtilError;

/// Which ceremony a challenge was issued for. A challenge issued for one
/// ceremony can never be consumed by the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeType {
    Registration,
    Authentication,
}

impl ChallengeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Authentication => "authentication",
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChallengeType {
    type Err = UtilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registration" => Ok(Self::Registration),
            "authentication" => Ok(Self::Authentication),
            other => Err(UtilError::Format(format!("Unknown challenge type: {other}"))),
        }
    }
}

/// A stored one-time challenge. The raw value is only present encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeRecord {
    pub id: String,
    pub challenge_hash: String,
    pub encrypted_challenge: String,
    pub challenge_type: ChallengeType,
    pub user_id: Option<String>,
    pub origin_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceType {
    Platform,
    CrossPlatform,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::CrossPlatform => "cross-platform",
        }
    }

    /// Maps the verifier's `credentialDeviceType` onto the stored device type.
    /// Synced (multi-device) passkeys roam, everything else stays on the platform.
    pub fn from_verifier(credential_device_type: &str) -> Self {
        if credential_device_type == "multiDevice" {
            Self::CrossPlatform
        } else {
            Self::Platform
        }
    }
}

impl FromStr for DeviceType {
    type Err = UtilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "platform" => Ok(Self::Platform),
            "cross-platform" => Ok(Self::CrossPlatform),
            other => Err(UtilError::Format(format!("Unknown device type: {other}"))),
        }
    }
}

/// Authenticator details captured at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMetadata {
    pub device_name: String,
    pub device_type: DeviceType,
    pub transports: Vec<String>,
    pub backed_up: bool,
    pub aaguid: String,
}

/// A registered passkey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasskeyCredential {
    pub credential_id: String,
    pub user_id: String,
    pub public_key: String,
    pub counter: u32,
    pub device_name: String,
    pub device_type: DeviceType,
    pub transports: Vec<String>,
    pub backed_up: bool,
    pub aaguid: String,
    pub flagged: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// Owner-facing view of a credential, without key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasskeySummary {
    pub id: String,
    pub device_name: String,
    pub device_type: DeviceType,
    pub backed_up: bool,
    pub last_used: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub flagged: bool,
}

impl From<&PasskeyCredential> for PasskeySummary {
    fn from(credential: &PasskeyCredential) -> Self {
        Self {
            id: credential.credential_id.clone(),
            device_name: credential.device_name.clone(),
            device_type: credential.device_type,
            backed_up: credential.backed_up,
            last_used: credential.last_used_at,
            created_at: credential.created_at,
            flagged: credential.flagged,
        }
    }
}
