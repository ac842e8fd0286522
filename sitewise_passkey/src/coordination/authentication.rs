use serde::Deserialize;

use super::service::{PasskeyService, verification_failed};
use crate::passkey::{
    AuthenticationCeremonyOptions, AuthenticationResponse, ChallengeType, CredentialDescriptor,
    ParsedClientData, PasskeyError,
};
use crate::utils::gen_random_string;
use crate::verifier::{VerifierAuthenticationRequest, VerifierCredential};

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct AuthenticationFinishRequest {
    pub response: AuthenticationResponse,
}

/// Result of a successful assertion. The caller turns it into a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationOutcome {
    pub user_id: String,
    pub credential_id: String,
    pub counter: u32,
    /// The signature counter did not advance. For audit only, never shown to the user.
    pub counter_anomaly: bool,
}

impl PasskeyService {
    /// Issues an authentication challenge. With a known `user_id` the options
    /// list that user's credentials, otherwise discoverable credentials are used.
    /// The challenge itself is never bound to a user; the asserted credential
    /// decides who signs in.
    pub async fn start_authentication(
        &self,
        user_id: Option<&str>,
        origin_ip: Option<&str>,
    ) -> Result<AuthenticationCeremonyOptions, PasskeyError> {
        self.enforce_rate_limit(
            "authentication",
            self.config.authentication_limit,
            origin_ip,
        )
        .await?;

        let challenge = gen_random_string(32)?;
        self.challenges
            .issue(&challenge, ChallengeType::Authentication, None, origin_ip)
            .await?;

        let allow_credentials = match user_id {
            Some(user_id) => {
                let descriptors: Vec<_> = self
                    .credentials
                    .list_by_user(user_id)
                    .await
                    .iter()
                    .map(|c| CredentialDescriptor::new(&c.credential_id, &c.transports))
                    .collect();
                (!descriptors.is_empty()).then_some(descriptors)
            }
            None => None,
        };

        Ok(AuthenticationCeremonyOptions {
            challenge,
            rp_id: self.config.rp_id.clone(),
            user_verification: "required".to_string(),
            timeout: self.config.ceremony_timeout_ms,
            allow_credentials,
        })
    }

    /// Verifies an assertion, applies the counter rule and records the use.
    pub async fn finish_authentication(
        &self,
        request: AuthenticationFinishRequest,
        origin_ip: Option<&str>,
    ) -> Result<AuthenticationOutcome, PasskeyError> {
        let response = request.response;
        if response.id.is_empty() {
            return Err(PasskeyError::InvalidRequest("Missing credential ID".into()).log());
        }

        let client_data = ParsedClientData::from_base64(&response.response.client_data_json)
            .map_err(PasskeyError::log)?;
        if client_data.type_ != "webauthn.get" {
            return Err(PasskeyError::InvalidRequest(format!(
                "Unexpected client data type: {}",
                client_data.type_
            ))
            .log());
        }
        tracing::debug!(
            credential_id = %response.id,
            origin = %client_data.origin,
            "Authentication response received"
        );

        if self
            .challenges
            .consume(&client_data.challenge, ChallengeType::Authentication)
            .await
            .is_none()
        {
            tracing::warn!(
                event = "passkey_auth_invalid_challenge",
                credential_id = %response.id,
                client_ip = origin_ip.unwrap_or_default(),
                "Authentication with invalid or expired challenge"
            );
            return Err(PasskeyError::InvalidOrExpiredChallenge);
        }

        let Some(credential) = self.credentials.find_by_id(&response.id).await else {
            tracing::warn!(
                event = "passkey_auth_unknown_credential",
                credential_id = %response.id,
                client_ip = origin_ip.unwrap_or_default(),
                "Authentication with unknown credential"
            );
            return Err(PasskeyError::UnknownCredential);
        };

        let verify_request = VerifierAuthenticationRequest {
            response,
            expected_challenge: client_data.challenge,
            expected_origin: self.config.allowed_origins.clone(),
            expected_rp_id: self.config.rp_id.clone(),
            credential: VerifierCredential {
                id: credential.credential_id.clone(),
                public_key: credential.public_key.clone(),
                counter: credential.counter,
            },
        };

        let verified = match self.verifier.verify_authentication(&verify_request).await {
            Ok(verified) => verified,
            Err(e) => {
                if e.is_counter_error() {
                    tracing::warn!(
                        event = "passkey_counter_error",
                        user_id = %credential.user_id,
                        credential_id = %credential.credential_id,
                        client_ip = origin_ip.unwrap_or_default(),
                        "Verifier reported a counter error, flagging credential"
                    );
                    if let Err(flag_err) = self.credentials.flag(&credential.credential_id).await {
                        tracing::error!("Failed to flag credential: {}", flag_err);
                    }
                }
                return Err(verification_failed("authentication", &e, origin_ip));
            }
        };

        let stored = credential.counter;
        let reported = verified.new_counter;
        let counter_anomaly = stored > 0 && reported <= stored;
        if counter_anomaly {
            tracing::warn!(
                event = "passkey_counter_anomaly",
                user_id = %credential.user_id,
                credential_id = %credential.credential_id,
                stored_counter = stored,
                reported_counter = reported,
                client_ip = origin_ip.unwrap_or_default(),
                "Signature counter did not increase, possible cloned authenticator"
            );
            if let Err(e) = self.credentials.flag(&credential.credential_id).await {
                tracing::error!("Failed to flag credential: {}", e);
            }
        }

        self.credentials
            .record_successful_use(&credential.credential_id, reported)
            .await?;

        tracing::info!(
            event = "passkey_auth_success",
            user_id = %credential.user_id,
            credential_id = %credential.credential_id,
            client_ip = origin_ip.unwrap_or_default(),
            "Passkey authentication succeeded"
        );

        Ok(AuthenticationOutcome {
            user_id: credential.user_id,
            credential_id: credential.credential_id,
            counter: reported,
            counter_anomaly,
        })
    }
}
