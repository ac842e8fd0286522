use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::Verifier;
use super::errors::VerifierError;
use super::types::{
    VerifiedAuthentication, VerifiedRegistration, VerifierAuthenticationRequest, VerifierEnvelope,
    VerifierRegistrationRequest,
};
use crate::config::PasskeyConfig;

const REGISTRATION_PATH: &str = "/verify/registration";
const AUTHENTICATION_PATH: &str = "/verify/authentication";

/// JSON-over-HTTP client for the verifier service.
#[derive(Clone)]
pub struct HttpVerifierClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl std::fmt::Debug for HttpVerifierClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpVerifierClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpVerifierClient {
    pub fn new(base_url: Url, api_key: String, timeout: Duration) -> Result<Self, VerifierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| VerifierError::Protocol(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    pub fn from_config(config: &PasskeyConfig) -> Result<Self, VerifierError> {
        Self::new(
            config.verifier_url.clone(),
            config.verifier_api_key.clone(),
            config.verifier_timeout,
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, VerifierError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.endpoint(path))
            .header("X-API-Key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let envelope = response.json::<VerifierEnvelope<T>>().await;

        if status != reqwest::StatusCode::OK {
            let (code, message) = match envelope {
                Ok(envelope) => (envelope.code, envelope.error),
                Err(_) => (None, None),
            };
            return Err(VerifierError::Rejected {
                status: status.as_u16(),
                code,
                message: message.unwrap_or_else(|| format!("Verifier returned {status}")),
            });
        }

        let envelope = envelope?;
        if !envelope.success {
            return Err(VerifierError::Rejected {
                status: status.as_u16(),
                code: envelope.code,
                message: envelope
                    .error
                    .unwrap_or_else(|| "Verification failed".to_string()),
            });
        }

        envelope
            .data
            .ok_or_else(|| VerifierError::Protocol("Missing data in verifier response".to_string()))
    }
}

#[async_trait]
impl Verifier for HttpVerifierClient {
    async fn verify_registration(
        &self,
        request: &VerifierRegistrationRequest,
    ) -> Result<VerifiedRegistration, VerifierError> {
        let data: VerifiedRegistration = self.post(REGISTRATION_PATH, request).await?;
        if !data.verified {
            return Err(VerifierError::Rejected {
                status: 200,
                code: None,
                message: "Registration not verified".to_string(),
            });
        }
        Ok(data)
    }

    async fn verify_authentication(
        &self,
        request: &VerifierAuthenticationRequest,
    ) -> Result<VerifiedAuthentication, VerifierError> {
        let data: VerifiedAuthentication = self.post(AUTHENTICATION_PATH, request).await?;
        if !data.verified {
            return Err(VerifierError::Rejected {
                status: 200,
                code: None,
                message: "Authentication not verified".to_string(),
            });
        }
        Ok(data)
    }
}
