//! Shared helpers for router tests: an in-memory service, a header-driven
//! session bridge and a verifier that accepts everything.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use http::{HeaderMap, HeaderValue, header::SET_COOKIE};
use serde_json::{Value, json};

use sitewise_passkey::{
    DeviceMetadata, DeviceType, InMemoryChallengeRepository, InMemoryCredentialRepository,
    ManualClock, PasskeyConfig, PasskeyService, VerifiedAuthentication, VerifiedRegistration,
    Verifier, VerifierAuthenticationRequest, VerifierError, VerifierRegistrationRequest,
};

use crate::bridge::{SessionBridge, SessionGrant, SessionUser};
use crate::passkey::passkey_router;

/// Accepts every ceremony. Authentication advances the stored counter by one.
struct AcceptingVerifier;

#[async_trait]
impl Verifier for AcceptingVerifier {
    async fn verify_registration(
        &self,
        request: &VerifierRegistrationRequest,
    ) -> Result<VerifiedRegistration, VerifierError> {
        Ok(VerifiedRegistration {
            verified: true,
            credential_id: request.response.id.clone(),
            public_key: format!("pk-{}", request.response.id),
            counter: 0,
            credential_device_type: "singleDevice".to_string(),
            credential_backed_up: false,
            aaguid: String::new(),
        })
    }

    async fn verify_authentication(
        &self,
        request: &VerifierAuthenticationRequest,
    ) -> Result<VerifiedAuthentication, VerifierError> {
        Ok(VerifiedAuthentication {
            verified: true,
            new_counter: request.credential.counter + 1,
        })
    }
}

/// Signs requests in through an `x-test-user` header. Known users are `u1` and `u2`.
struct HeaderBridge;

const KNOWN_USERS: [&str; 2] = ["u1", "u2"];

#[async_trait]
impl SessionBridge for HeaderBridge {
    async fn current_user(&self, headers: &HeaderMap) -> Option<SessionUser> {
        let id = headers.get("x-test-user")?.to_str().ok()?;
        Some(SessionUser {
            id: id.to_string(),
            name: format!("{id}@example.com"),
            display_name: format!("User {id}"),
        })
    }

    async fn user_id_by_email(&self, email: &str) -> Option<String> {
        let id = email.strip_suffix("@example.com")?;
        KNOWN_USERS.contains(&id).then(|| id.to_string())
    }

    async fn issue_session(&self, user_id: &str) -> Result<SessionGrant, String> {
        let mut headers = HeaderMap::new();
        let cookie = HeaderValue::from_str(&format!("session={user_id}")).map_err(|e| e.to_string())?;
        headers.insert(SET_COOKIE, cookie);
        Ok(SessionGrant {
            headers,
            body: json!({"userId": user_id}),
        })
    }
}

pub(crate) struct TestApp {
    pub(crate) service: Arc<PasskeyService>,
}

impl TestApp {
    pub(crate) fn new() -> Self {
        Self::with_env(&[])
    }

    pub(crate) fn with_env(vars: &[(&str, &str)]) -> Self {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = PasskeyConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();
        let service = PasskeyService::new(
            config,
            Arc::new(InMemoryChallengeRepository::new()),
            Arc::new(InMemoryCredentialRepository::new()),
            Arc::new(AcceptingVerifier),
            Arc::new(ManualClock::default()),
        );
        Self {
            service: Arc::new(service),
        }
    }

    pub(crate) fn router(&self) -> Router {
        passkey_router(self.service.clone(), Arc::new(HeaderBridge))
    }

    pub(crate) async fn add_credential(&self, user_id: &str, credential_id: &str, counter: u32) {
        self.service
            .credentials()
            .create(
                user_id,
                credential_id,
                &format!("pk-{credential_id}"),
                counter,
                DeviceMetadata {
                    device_name: "Test Phone".to_string(),
                    device_type: DeviceType::Platform,
                    transports: vec!["internal".to_string()],
                    backed_up: false,
                    aaguid: String::new(),
                },
            )
            .await
            .unwrap();
    }
}

fn client_data(type_: &str, challenge: &str) -> String {
    let data = json!({
        "type": type_,
        "challenge": challenge,
        "origin": "http://127.0.0.1:5173"
    });
    URL_SAFE_NO_PAD.encode(data.to_string())
}

pub(crate) fn registration_body(credential_id: &str, challenge: &str, device_name: Option<&str>) -> Value {
    json!({
        "response": {
            "id": credential_id,
            "rawId": credential_id,
            "type": "public-key",
            "response": {
                "clientDataJSON": client_data("webauthn.create", challenge),
                "attestationObject": "o2NmbXRkbm9uZQ",
                "transports": ["internal"]
            },
            "clientExtensionResults": {}
        },
        "deviceName": device_name
    })
}

pub(crate) fn authentication_body(credential_id: &str, challenge: &str) -> Value {
    json!({
        "response": {
            "id": credential_id,
            "rawId": credential_id,
            "type": "public-key",
            "response": {
                "clientDataJSON": client_data("webauthn.get", challenge),
                "authenticatorData": "SZYN5YgOjGh0NBcPZHZgW4_krrmihjLHmVzzuoMdl2MFAAAAAQ",
                "signature": "MEUCIQDsig"
            },
            "clientExtensionResults": {}
        }
    })
}
