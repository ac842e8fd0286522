//! Boundary to the external WebAuthn verification service.

mod client;
mod errors;
mod types;

use async_trait::async_trait;

pub use client::HttpVerifierClient;
pub use errors::VerifierError;
pub use types::{
    VerifiedAuthentication, VerifiedRegistration, VerifierAuthenticationRequest,
    VerifierCredential, VerifierRegistrationRequest,
};

/// Checks attestations and assertions. The coordinator never verifies signatures itself.
#[async_trait]
pub trait Verifier: Send + Sync + 'static {
    async fn verify_registration(
        &self,
        request: &VerifierRegistrationRequest,
    ) -> Result<VerifiedRegistration, VerifierError>;

    async fn verify_authentication(
        &self,
        request: &VerifierAuthenticationRequest,
    ) -> Result<VerifiedAuthentication, VerifierError>;
}
