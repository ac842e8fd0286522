//! sitewise_passkey - Passkey (WebAuthn) ceremony coordination for Site-Wise
//!
//! This crate owns the server side of the passkey flows: one-time challenge
//! issuance and storage, the credential registry, per-IP rate limiting and the
//! boundary to the external cryptographic verifier service. The cryptographic
//! ceremony itself runs in the browser and the proof checking runs in the
//! verifier; this crate orchestrates both and keeps the state.

mod clock;
mod config;
mod coordination;
mod passkey;
mod storage;
mod utils;
mod verifier;

#[cfg(test)]
mod test_utils;

pub use clock::{Clock, ManualClock, SystemClock};

pub use config::{KeySource, PasskeyConfig, RateLimitPolicy};

pub use coordination::{
    AuthenticationFinishRequest, AuthenticationOutcome, ClientCeremonyFailure, ClientFailureKind,
    PasskeyService, RegistrationFinishRequest, RegistrationUser, report_client_failure,
    spawn_challenge_sweeper, sweep_until_clean,
};

pub use passkey::{
    AssertionResponse, AttestationResponse, AuthenticationCeremonyOptions, AuthenticationResponse,
    AuthenticatorSelection, ChallengeRecord, ChallengeRepository, ChallengeStore, ChallengeType,
    CredentialDescriptor, CredentialRepository, CredentialStore, DeviceMetadata, DeviceType,
    InMemoryChallengeRepository, InMemoryCredentialRepository, PasskeyCredential, PasskeyError,
    PasskeySummary, PubKeyCredParam, RateLimiter, RegistrationCeremonyOptions,
    RegistrationResponse, RelyingParty, UserEntity, open_repositories, sanitize_device_name,
    validate_device_name,
};

pub use storage::{DataStore, StorageConfig, StorageError, StoreType};

pub use utils::UtilError;

pub use verifier::{
    HttpVerifierClient, VerifiedAuthentication, VerifiedRegistration, Verifier,
    VerifierAuthenticationRequest, VerifierCredential, VerifierError, VerifierRegistrationRequest,
};
