//! Wire types exchanged with the browser ceremony.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::PasskeyError;
use crate::utils::base64url_decode;

const PUBLIC_KEY_TYPE: &str = "public-key";

fn public_key_type() -> String {
    PUBLIC_KEY_TYPE.to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RelyingParty {
    pub name: String,
    pub id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    /// base64url of the user id bytes
    pub id: String,
    pub name: String,
    pub display_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub type_: String,
    pub alg: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    pub authenticator_attachment: String,
    pub user_verification: String,
    pub resident_key: String,
    pub require_resident_key: bool,
}

/// A credential reference used in `excludeCredentials` and `allowCredentials`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub transports: Vec<String>,
}

/// Transport hints as reported, or `["internal"]` when none were.
pub(crate) fn transports_or_default(transports: Option<&[String]>) -> Vec<String> {
    match transports {
        Some(t) if !t.is_empty() => t.to_vec(),
        _ => vec!["internal".to_string()],
    }
}

impl CredentialDescriptor {
    pub(crate) fn new(id: &str, transports: &[String]) -> Self {
        Self {
            id: id.to_string(),
            type_: public_key_type(),
            transports: transports_or_default(Some(transports)),
        }
    }
}

/// `PublicKeyCredentialCreationOptions` as JSON for the browser.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationCeremonyOptions {
    pub challenge: String,
    pub rp: RelyingParty,
    pub user: UserEntity,
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    pub authenticator_selection: AuthenticatorSelection,
    pub timeout: u32,
    pub attestation: String,
    pub exclude_credentials: Vec<CredentialDescriptor>,
}

/// `PublicKeyCredentialRequestOptions` as JSON for the browser.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationCeremonyOptions {
    pub challenge: String,
    pub rp_id: String,
    pub user_verification: String,
    pub timeout: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_credentials: Option<Vec<CredentialDescriptor>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub attestation_object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The JSON form of a `PublicKeyCredential` returned by `navigator.credentials.create()`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id: String,
    pub raw_id: String,
    pub response: AttestationResponse,
    #[serde(rename = "type", default = "public_key_type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<String>,
    #[serde(default)]
    pub client_extension_results: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub authenticator_data: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The JSON form of a `PublicKeyCredential` returned by `navigator.credentials.get()`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponse {
    pub id: String,
    pub raw_id: String,
    pub response: AssertionResponse,
    #[serde(rename = "type", default = "public_key_type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<String>,
    #[serde(default)]
    pub client_extension_results: Map<String, Value>,
}

#[derive(Deserialize, Debug)]
struct CollectedClientData {
    #[serde(rename = "type")]
    type_: String,
    challenge: String,
    #[serde(default)]
    origin: String,
}

/// The fields of `clientDataJSON` the coordinator needs before calling the verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedClientData {
    pub(crate) type_: String,
    pub(crate) challenge: String,
    pub(crate) origin: String,
}

impl ParsedClientData {
    pub(crate) fn from_base64(client_data_json: &str) -> Result<Self, PasskeyError> {
        let raw = base64url_decode(client_data_json)
            .map_err(|_| PasskeyError::InvalidRequest("Malformed clientDataJSON".into()))?;
        let data: CollectedClientData = serde_json::from_slice(&raw)
            .map_err(|e| PasskeyError::InvalidRequest(format!("Invalid clientDataJSON: {e}")))?;

        if data.challenge.is_empty() {
            return Err(PasskeyError::InvalidRequest(
                "Missing challenge in clientDataJSON".into(),
            ));
        }

        Ok(Self {
            type_: data.type_,
            challenge: data.challenge,
            origin: data.origin,
        })
    }
}
