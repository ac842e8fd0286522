use serde::Deserialize;

use super::service::{PasskeyService, verification_failed};
use crate::passkey::{
    AuthenticatorSelection, ChallengeType, CredentialDescriptor, DeviceMetadata, DeviceType,
    ParsedClientData, PasskeyCredential, PasskeyError, PubKeyCredParam,
    RegistrationCeremonyOptions, RegistrationResponse, RelyingParty, UserEntity,
    sanitize_device_name, transports_or_default, validate_device_name,
};
use crate::utils::{base64url_encode, gen_random_string};
use crate::verifier::VerifierRegistrationRequest;

const ES256: i32 = -7;
const RS256: i32 = -257;

/// The account a passkey is being registered for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationUser {
    pub id: String,
    /// Shown by the authenticator, usually the email address
    pub name: String,
    pub display_name: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationFinishRequest {
    pub response: RegistrationResponse,
    #[serde(default)]
    pub device_name: Option<String>,
}

impl PasskeyService {
    /// Issues a registration challenge bound to `user` and returns the creation options.
    pub async fn start_registration(
        &self,
        user: &RegistrationUser,
        origin_ip: Option<&str>,
    ) -> Result<RegistrationCeremonyOptions, PasskeyError> {
        self.enforce_rate_limit("registration", self.config.registration_limit, origin_ip)
            .await?;

        let challenge = gen_random_string(32)?;
        self.challenges
            .issue(
                &challenge,
                ChallengeType::Registration,
                Some(&user.id),
                origin_ip,
            )
            .await?;

        let exclude_credentials = self
            .credentials
            .list_by_user(&user.id)
            .await
            .iter()
            .map(|c| CredentialDescriptor::new(&c.credential_id, &c.transports))
            .collect();

        let display_name = if user.display_name.trim().is_empty() {
            user.name.clone()
        } else {
            user.display_name.clone()
        };

        tracing::debug!(user_id = %user.id, "Registration challenge issued");

        Ok(RegistrationCeremonyOptions {
            challenge,
            rp: RelyingParty {
                name: self.config.rp_name.clone(),
                id: self.config.rp_id.clone(),
            },
            user: UserEntity {
                id: base64url_encode(user.id.as_bytes()),
                name: user.name.clone(),
                display_name,
            },
            pub_key_cred_params: vec![
                PubKeyCredParam {
                    type_: "public-key".to_string(),
                    alg: ES256,
                },
                PubKeyCredParam {
                    type_: "public-key".to_string(),
                    alg: RS256,
                },
            ],
            authenticator_selection: AuthenticatorSelection {
                authenticator_attachment: "platform".to_string(),
                user_verification: "required".to_string(),
                resident_key: "preferred".to_string(),
                require_resident_key: false,
            },
            timeout: self.config.ceremony_timeout_ms,
            attestation: "none".to_string(),
            exclude_credentials,
        })
    }

    /// Verifies the attestation and stores the new credential for `user_id`.
    pub async fn finish_registration(
        &self,
        user_id: &str,
        request: RegistrationFinishRequest,
        origin_ip: Option<&str>,
    ) -> Result<PasskeyCredential, PasskeyError> {
        if let Some(name) = request.device_name.as_deref() {
            validate_device_name(name).map_err(PasskeyError::log)?;
        }

        let client_data = ParsedClientData::from_base64(&request.response.response.client_data_json)
            .map_err(PasskeyError::log)?;
        if client_data.type_ != "webauthn.create" {
            return Err(PasskeyError::InvalidRequest(format!(
                "Unexpected client data type: {}",
                client_data.type_
            ))
            .log());
        }
        tracing::debug!(user_id, origin = %client_data.origin, "Registration response received");

        let Some(record) = self
            .challenges
            .consume(&client_data.challenge, ChallengeType::Registration)
            .await
        else {
            tracing::warn!(
                event = "passkey_registration_invalid_challenge",
                user_id,
                client_ip = origin_ip.unwrap_or_default(),
                "Registration with invalid or expired challenge"
            );
            return Err(PasskeyError::InvalidOrExpiredChallenge);
        };

        if record.user_id.as_deref() != Some(user_id) {
            tracing::warn!(
                event = "passkey_registration_user_mismatch",
                user_id,
                client_ip = origin_ip.unwrap_or_default(),
                "Registration challenge was issued for another user"
            );
            return Err(PasskeyError::InvalidOrExpiredChallenge);
        }

        if self
            .credentials
            .find_by_id(&request.response.id)
            .await
            .is_some()
        {
            tracing::warn!(
                event = "passkey_registration_duplicate",
                user_id,
                credential_id = %request.response.id,
                "Credential already registered"
            );
            return Err(PasskeyError::DuplicateCredential);
        }

        let verify_request = VerifierRegistrationRequest {
            response: request.response,
            expected_challenge: client_data.challenge,
            expected_origin: self.config.allowed_origins.clone(),
            expected_rp_id: self.config.rp_id.clone(),
        };
        let verified = self
            .verifier
            .verify_registration(&verify_request)
            .await
            .map_err(|e| verification_failed("registration", &e, origin_ip))?;

        let metadata = DeviceMetadata {
            device_name: sanitize_device_name(request.device_name.as_deref()),
            device_type: DeviceType::from_verifier(&verified.credential_device_type),
            transports: transports_or_default(
                verify_request.response.response.transports.as_deref(),
            ),
            backed_up: verified.credential_backed_up,
            aaguid: verified.aaguid,
        };

        let credential = self
            .credentials
            .create(
                user_id,
                &verified.credential_id,
                &verified.public_key,
                verified.counter,
                metadata,
            )
            .await?;

        tracing::info!(
            event = "passkey_registered",
            user_id,
            credential_id = %credential.credential_id,
            device_type = credential.device_type.as_str(),
            client_ip = origin_ip.unwrap_or_default(),
            "Passkey registered"
        );

        Ok(credential)
    }
}
