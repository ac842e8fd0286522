mod ceremony;
mod challenge;
mod cipher;
mod credential;
mod device_name;
mod errors;
mod rate_limit;
mod storage;
mod types;

pub use ceremony::{
    AssertionResponse, AttestationResponse, AuthenticationCeremonyOptions, AuthenticationResponse,
    AuthenticatorSelection, CredentialDescriptor, PubKeyCredParam, RegistrationCeremonyOptions,
    RegistrationResponse, RelyingParty, UserEntity,
};
pub use challenge::ChallengeStore;
pub use credential::CredentialStore;
pub use device_name::{sanitize_device_name, validate_device_name};
pub use errors::PasskeyError;
pub use rate_limit::RateLimiter;
pub use storage::{
    ChallengeRepository, CredentialRepository, InMemoryChallengeRepository,
    InMemoryCredentialRepository, open_repositories,
};
pub use types::{
    ChallengeRecord, ChallengeType, DeviceMetadata, DeviceType, PasskeyCredential, PasskeySummary,
};

pub(crate) use ceremony::{ParsedClientData, transports_or_default};
