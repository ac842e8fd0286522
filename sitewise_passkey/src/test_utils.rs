//! Shared fixtures for unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, json};

use crate::clock::ManualClock;
use crate::config::PasskeyConfig;
use crate::coordination::PasskeyService;
use crate::passkey::{
    AssertionResponse, AttestationResponse, AuthenticationResponse, ChallengeRecord,
    ChallengeRepository, ChallengeType, CredentialRepository, DeviceMetadata, DeviceType,
    InMemoryChallengeRepository, InMemoryCredentialRepository, PasskeyCredential,
    RegistrationResponse,
};
use crate::storage::StorageError;
use crate::utils::base64url_encode;
use crate::verifier::{
    VerifiedAuthentication, VerifiedRegistration, Verifier, VerifierAuthenticationRequest,
    VerifierError, VerifierRegistrationRequest,
};

pub(crate) const TEST_KEY: [u8; 32] = *b"0123456789abcdef0123456789abcdef";

const TEST_ORIGIN: &str = "http://127.0.0.1:5173";

/// Collects formatted log output while the returned guard is alive.
#[derive(Clone, Default)]
pub(crate) struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub(crate) fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = Self::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        (capture, tracing::subscriber::set_default(subscriber))
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Current time truncated to milliseconds, the precision the SQL backends keep.
fn now_millis() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap()
}

pub(crate) fn sample_challenge(
    id: &str,
    hash: &str,
    challenge_type: ChallengeType,
    created_at: DateTime<Utc>,
) -> ChallengeRecord {
    ChallengeRecord {
        id: id.to_string(),
        challenge_hash: hash.to_string(),
        encrypted_challenge: format!("enc-{id}"),
        challenge_type,
        user_id: None,
        origin_ip: None,
        created_at,
        expires_at: created_at + Duration::minutes(5),
    }
}

pub(crate) fn sample_metadata() -> DeviceMetadata {
    DeviceMetadata {
        device_name: "Test Phone".to_string(),
        device_type: DeviceType::Platform,
        transports: vec!["internal".to_string()],
        backed_up: false,
        aaguid: "00000000-0000-0000-0000-000000000000".to_string(),
    }
}

pub(crate) fn sample_credential(credential_id: &str, user_id: &str, counter: u32) -> PasskeyCredential {
    let now = now_millis();
    let metadata = sample_metadata();
    PasskeyCredential {
        credential_id: credential_id.to_string(),
        user_id: user_id.to_string(),
        public_key: format!("pk-{credential_id}"),
        counter,
        device_name: metadata.device_name,
        device_type: metadata.device_type,
        transports: metadata.transports,
        backed_up: metadata.backed_up,
        aaguid: metadata.aaguid,
        flagged: false,
        created_at: now,
        last_used_at: now,
    }
}

fn client_data(type_: &str, challenge: &str) -> String {
    let data = json!({
        "type": type_,
        "challenge": challenge,
        "origin": TEST_ORIGIN,
        "crossOrigin": false
    });
    base64url_encode(data.to_string().as_bytes())
}

pub(crate) fn sample_registration_response(credential_id: &str, challenge: &str) -> RegistrationResponse {
    RegistrationResponse {
        id: credential_id.to_string(),
        raw_id: credential_id.to_string(),
        response: AttestationResponse {
            client_data_json: client_data("webauthn.create", challenge),
            attestation_object: "o2NmbXRkbm9uZWdhdHRTdG10oA".to_string(),
            transports: None,
            extra: Map::new(),
        },
        type_: "public-key".to_string(),
        authenticator_attachment: Some("platform".to_string()),
        client_extension_results: Map::new(),
    }
}

pub(crate) fn sample_authentication_response(
    credential_id: &str,
    challenge: &str,
) -> AuthenticationResponse {
    AuthenticationResponse {
        id: credential_id.to_string(),
        raw_id: credential_id.to_string(),
        response: AssertionResponse {
            client_data_json: client_data("webauthn.get", challenge),
            authenticator_data: "SZYN5YgOjGh0NBcPZHZgW4_krrmihjLHmVzzuoMdl2MFAAAABQ".to_string(),
            signature: "MEUCIQDsig".to_string(),
            user_handle: None,
            extra: Map::new(),
        },
        type_: "public-key".to_string(),
        authenticator_attachment: Some("platform".to_string()),
        client_extension_results: Map::new(),
    }
}

pub(crate) fn verified_registration(
    credential_id: &str,
    public_key: &str,
    counter: u32,
) -> VerifiedRegistration {
    VerifiedRegistration {
        verified: true,
        credential_id: credential_id.to_string(),
        public_key: public_key.to_string(),
        counter,
        credential_device_type: String::new(),
        credential_backed_up: false,
        aaguid: String::new(),
    }
}

fn storage_down() -> StorageError {
    StorageError::Storage("database is unavailable".to_string())
}

/// A challenge repository whose every call fails.
pub(crate) struct FailingChallengeRepository;

#[async_trait]
impl ChallengeRepository for FailingChallengeRepository {
    async fn init(&self) -> Result<(), StorageError> {
        Err(storage_down())
    }

    async fn insert(&self, _record: &ChallengeRecord) -> Result<(), StorageError> {
        Err(storage_down())
    }

    async fn find_latest_unexpired(
        &self,
        _hash: &str,
        _challenge_type: ChallengeType,
        _now: DateTime<Utc>,
    ) -> Result<Option<ChallengeRecord>, StorageError> {
        Err(storage_down())
    }

    async fn delete(&self, _id: &str) -> Result<bool, StorageError> {
        Err(storage_down())
    }

    async fn delete_expired(&self, _now: DateTime<Utc>, _limit: usize) -> Result<u64, StorageError> {
        Err(storage_down())
    }

    async fn count_recent_by_ip(
        &self,
        _origin_ip: &str,
        _since: DateTime<Utc>,
        _limit: usize,
    ) -> Result<usize, StorageError> {
        Err(storage_down())
    }
}

/// A credential repository whose every call fails.
pub(crate) struct FailingCredentialRepository;

#[async_trait]
impl CredentialRepository for FailingCredentialRepository {
    async fn init(&self) -> Result<(), StorageError> {
        Err(storage_down())
    }

    async fn insert(&self, _credential: &PasskeyCredential) -> Result<(), StorageError> {
        Err(storage_down())
    }

    async fn get(&self, _credential_id: &str) -> Result<Option<PasskeyCredential>, StorageError> {
        Err(storage_down())
    }

    async fn list_by_user(
        &self,
        _user_id: &str,
        _limit: usize,
    ) -> Result<Vec<PasskeyCredential>, StorageError> {
        Err(storage_down())
    }

    async fn update_usage(
        &self,
        _credential_id: &str,
        _counter: u32,
        _used_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        Err(storage_down())
    }

    async fn set_flagged(&self, _credential_id: &str) -> Result<bool, StorageError> {
        Err(storage_down())
    }

    async fn rename(&self, _credential_id: &str, _device_name: &str) -> Result<bool, StorageError> {
        Err(storage_down())
    }

    async fn delete(&self, _credential_id: &str) -> Result<bool, StorageError> {
        Err(storage_down())
    }
}

/// A verifier returning canned results and recording what it was sent.
pub(crate) struct MockVerifier {
    registration: Mutex<Result<VerifiedRegistration, VerifierError>>,
    authentication: Mutex<Result<VerifiedAuthentication, VerifierError>>,
    registration_requests: Mutex<Vec<VerifierRegistrationRequest>>,
    authentication_requests: Mutex<Vec<VerifierAuthenticationRequest>>,
}

impl MockVerifier {
    pub(crate) fn new() -> Self {
        Self {
            registration: Mutex::new(Ok(verified_registration("cred-1", "pk-cred-1", 0))),
            authentication: Mutex::new(Ok(VerifiedAuthentication {
                verified: true,
                new_counter: 1,
            })),
            registration_requests: Mutex::new(Vec::new()),
            authentication_requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_registration(&self, result: Result<VerifiedRegistration, VerifierError>) {
        *self.registration.lock().unwrap() = result;
    }

    pub(crate) fn set_authentication(&self, result: Result<VerifiedAuthentication, VerifierError>) {
        *self.authentication.lock().unwrap() = result;
    }

    pub(crate) fn registration_calls(&self) -> usize {
        self.registration_requests.lock().unwrap().len()
    }

    pub(crate) fn authentication_calls(&self) -> usize {
        self.authentication_requests.lock().unwrap().len()
    }

    pub(crate) fn last_registration_request(&self) -> Option<VerifierRegistrationRequest> {
        self.registration_requests.lock().unwrap().last().cloned()
    }

    pub(crate) fn last_authentication_request(&self) -> Option<VerifierAuthenticationRequest> {
        self.authentication_requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Verifier for MockVerifier {
    async fn verify_registration(
        &self,
        request: &VerifierRegistrationRequest,
    ) -> Result<VerifiedRegistration, VerifierError> {
        self.registration_requests
            .lock()
            .unwrap()
            .push(request.clone());
        self.registration.lock().unwrap().clone()
    }

    async fn verify_authentication(
        &self,
        request: &VerifierAuthenticationRequest,
    ) -> Result<VerifiedAuthentication, VerifierError> {
        self.authentication_requests
            .lock()
            .unwrap()
            .push(request.clone());
        self.authentication.lock().unwrap().clone()
    }
}

/// A service over in-memory repositories, a mock verifier and a manual clock.
pub(crate) struct TestHarness {
    pub(crate) service: Arc<PasskeyService>,
    pub(crate) challenges: Arc<InMemoryChallengeRepository>,
    pub(crate) credentials: Arc<InMemoryCredentialRepository>,
    pub(crate) verifier: Arc<MockVerifier>,
    pub(crate) clock: ManualClock,
}

impl TestHarness {
    pub(crate) fn new() -> Self {
        let config = PasskeyConfig::from_lookup(|_| None).unwrap();
        let challenges = Arc::new(InMemoryChallengeRepository::new());
        let credentials = Arc::new(InMemoryCredentialRepository::new());
        let verifier = Arc::new(MockVerifier::new());
        let clock = ManualClock::new(now_millis());

        let service = PasskeyService::new(
            config,
            challenges.clone(),
            credentials.clone(),
            verifier.clone(),
            Arc::new(clock.clone()),
        );

        Self {
            service: Arc::new(service),
            challenges,
            credentials,
            verifier,
            clock,
        }
    }

    /// Stores a credential directly, bypassing the ceremony.
    pub(crate) async fn register_credential(
        &self,
        user_id: &str,
        credential_id: &str,
        counter: u32,
    ) -> PasskeyCredential {
        self.service
            .credentials()
            .create(
                user_id,
                credential_id,
                &format!("pk-{credential_id}"),
                counter,
                sample_metadata(),
            )
            .await
            .unwrap()
    }
}
