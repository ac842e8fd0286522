use serde::{Deserialize, Serialize};

use crate::passkey::{AuthenticationResponse, RegistrationResponse};

/// Body of `POST /verify/registration`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerifierRegistrationRequest {
    pub response: RegistrationResponse,
    pub expected_challenge: String,
    pub expected_origin: Vec<String>,
    #[serde(rename = "expectedRPID")]
    pub expected_rp_id: String,
}

/// The stored credential the assertion is checked against.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifierCredential {
    pub id: String,
    pub public_key: String,
    pub counter: u32,
}

/// Body of `POST /verify/authentication`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerifierAuthenticationRequest {
    pub response: AuthenticationResponse,
    pub expected_challenge: String,
    pub expected_origin: Vec<String>,
    #[serde(rename = "expectedRPID")]
    pub expected_rp_id: String,
    pub credential: VerifierCredential,
}

#[derive(Deserialize, Debug)]
pub(super) struct VerifierEnvelope<T> {
    #[serde(default)]
    pub(super) success: bool,
    pub(super) data: Option<T>,
    pub(super) error: Option<String>,
    pub(super) code: Option<String>,
}

fn verified_default() -> bool {
    true
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedRegistration {
    #[serde(default = "verified_default")]
    pub verified: bool,
    pub credential_id: String,
    pub public_key: String,
    #[serde(default)]
    pub counter: u32,
    /// `singleDevice` or `multiDevice`
    #[serde(default)]
    pub credential_device_type: String,
    #[serde(default)]
    pub credential_backed_up: bool,
    #[serde(default)]
    pub aaguid: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedAuthentication {
    #[serde(default = "verified_default")]
    pub verified: bool,
    #[serde(alias = "counter")]
    pub new_counter: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verified_authentication_accepts_counter_alias() {
        let a: VerifiedAuthentication =
            serde_json::from_value(json!({"verified": true, "newCounter": 7})).unwrap();
        let b: VerifiedAuthentication = serde_json::from_value(json!({"counter": 7})).unwrap();

        assert_eq!(a.new_counter, 7);
        assert_eq!(b.new_counter, 7);
        assert!(b.verified);
    }

    #[test]
    fn test_verified_registration_defaults() {
        let data: VerifiedRegistration =
            serde_json::from_value(json!({"credentialId": "cred-1", "publicKey": "pk"})).unwrap();

        assert!(data.verified);
        assert_eq!(data.counter, 0);
        assert_eq!(data.credential_device_type, "");
        assert!(!data.credential_backed_up);
    }

    #[test]
    fn test_envelope_with_error() {
        let envelope: VerifierEnvelope<VerifiedAuthentication> = serde_json::from_value(json!({
            "success": false,
            "error": "Counter went backwards",
            "code": "COUNTER_ERROR"
        }))
        .unwrap();

        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert_eq!(envelope.code.as_deref(), Some("COUNTER_ERROR"));
    }
}
