use std::env;
use std::time::Duration as StdDuration;

use chrono::Duration;
use url::Url;

use crate::passkey::PasskeyError;
use crate::utils::sha256_hex;

const DEFAULT_VERIFIER_URL: &str = "http://localhost:8787";
const DEFAULT_RP_ID: &str = "localhost";
const DEFAULT_RP_NAME: &str = "Site-Wise";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://127.0.0.1:5173,https://app.sitewise.com";
const FALLBACK_KEY_MATERIAL: &str = "default-key-change-me";

/// How many challenge issuances a single IP may make within `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_attempts: u32,
    pub window: Duration,
}

/// Where the challenge encryption key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// `WEBAUTHN_ENCRYPTION_KEY` was exactly 32 bytes and is used as is.
    Configured,
    /// `WEBAUTHN_ENCRYPTION_KEY` had another length and was stretched through SHA-256.
    Derived,
    /// No key configured, the well-known fallback material was used.
    Fallback,
}

/// Runtime settings for the passkey core, built once at startup and injected.
#[derive(Clone)]
pub struct PasskeyConfig {
    pub rp_id: String,
    pub rp_name: String,
    pub allowed_origins: Vec<String>,
    pub verifier_url: Url,
    pub verifier_api_key: String,
    pub verifier_timeout: StdDuration,
    pub challenge_ttl: Duration,
    /// Client ceremony timeout in milliseconds, as sent in the options.
    pub ceremony_timeout_ms: u32,
    pub registration_limit: RateLimitPolicy,
    pub authentication_limit: RateLimitPolicy,
    pub sweep_interval: StdDuration,
    pub sweep_batch: usize,
    pub key_source: KeySource,
    encryption_key: [u8; 32],
}

impl std::fmt::Debug for PasskeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasskeyConfig")
            .field("rp_id", &self.rp_id)
            .field("rp_name", &self.rp_name)
            .field("allowed_origins", &self.allowed_origins)
            .field("verifier_url", &self.verifier_url.as_str())
            .field("verifier_timeout", &self.verifier_timeout)
            .field("challenge_ttl", &self.challenge_ttl)
            .field("ceremony_timeout_ms", &self.ceremony_timeout_ms)
            .field("registration_limit", &self.registration_limit)
            .field("authentication_limit", &self.authentication_limit)
            .field("sweep_interval", &self.sweep_interval)
            .field("sweep_batch", &self.sweep_batch)
            .field("key_source", &self.key_source)
            .finish_non_exhaustive()
    }
}

impl PasskeyConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, PasskeyError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Invalid numeric values fall back to their defaults with a warning. The only
    /// hard failures are an unparsable verifier URL and the fallback encryption key
    /// in production.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PasskeyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let verifier_url_raw =
            non_empty("WEBAUTHN_VERIFIER_URL").unwrap_or_else(|| DEFAULT_VERIFIER_URL.to_string());
        let verifier_url = Url::parse(verifier_url_raw.trim()).map_err(|e| {
            PasskeyError::Config(format!("Invalid WEBAUTHN_VERIFIER_URL '{verifier_url_raw}': {e}"))
        })?;

        let verifier_api_key = lookup("WEBAUTHN_VERIFIER_API_KEY").unwrap_or_default();
        if verifier_api_key.is_empty() {
            tracing::warn!("WEBAUTHN_VERIFIER_API_KEY is not set. Verifier calls are unauthenticated");
        }

        let rp_id = non_empty("WEBAUTHN_RP_ID").unwrap_or_else(|| DEFAULT_RP_ID.to_string());
        let rp_name = non_empty("WEBAUTHN_RP_NAME").unwrap_or_else(|| DEFAULT_RP_NAME.to_string());

        let origins_raw = non_empty("WEBAUTHN_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string());
        let allowed_origins = parse_origins(&origins_raw);

        let (encryption_key, key_source) =
            derive_encryption_key(lookup("WEBAUTHN_ENCRYPTION_KEY").as_deref());
        let production = lookup("SITEWISE_ENV")
            .map(|v| v.trim().eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        match key_source {
            KeySource::Fallback if production => {
                return Err(PasskeyError::Config(
                    "WEBAUTHN_ENCRYPTION_KEY must be set in production".to_string(),
                ));
            }
            KeySource::Fallback => {
                tracing::warn!(
                    "WEBAUTHN_ENCRYPTION_KEY is not set. Using the built-in development key"
                );
            }
            KeySource::Derived => {
                tracing::debug!("WEBAUTHN_ENCRYPTION_KEY is not 32 bytes, deriving key via SHA-256");
            }
            KeySource::Configured => {}
        }

        let window_secs = parse_number(&lookup, "PASSKEY_RATE_LIMIT_WINDOW", 300u32);
        let window = Duration::seconds(i64::from(window_secs));

        Ok(Self {
            rp_id,
            rp_name,
            allowed_origins,
            verifier_url,
            verifier_api_key,
            verifier_timeout: StdDuration::from_secs(parse_number(
                &lookup,
                "WEBAUTHN_VERIFIER_TIMEOUT",
                10u64,
            )),
            challenge_ttl: Duration::seconds(i64::from(parse_number(
                &lookup,
                "PASSKEY_CHALLENGE_TTL",
                300u32,
            ))),
            ceremony_timeout_ms: parse_number(&lookup, "PASSKEY_TIMEOUT", 60u32)
                .saturating_mul(1000),
            registration_limit: RateLimitPolicy {
                max_attempts: parse_number(&lookup, "PASSKEY_REGISTRATION_RATE_LIMIT", 10u32),
                window,
            },
            authentication_limit: RateLimitPolicy {
                max_attempts: parse_number(&lookup, "PASSKEY_AUTHENTICATION_RATE_LIMIT", 20u32),
                window,
            },
            sweep_interval: StdDuration::from_secs(parse_number(
                &lookup,
                "PASSKEY_SWEEP_INTERVAL",
                300u64,
            )),
            sweep_batch: parse_number(&lookup, "PASSKEY_SWEEP_BATCH", 100usize),
            key_source,
            encryption_key,
        })
    }

    pub(crate) fn encryption_key(&self) -> &[u8; 32] {
        &self.encryption_key
    }
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display + PartialOrd + Default + Copy,
{
    match lookup(key) {
        None => default,
        Some(v) if v.trim().is_empty() => default,
        Some(v) => match v.trim().parse::<T>() {
            Ok(n) if n > T::default() => n,
            _ => {
                tracing::warn!("Invalid {}: {}. Using default {}", key, v, default);
                default
            }
        },
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match Url::parse(o) {
            Ok(url) if url.has_host() => Some(o.trim_end_matches('/').to_string()),
            _ => {
                tracing::warn!("Invalid origin in WEBAUTHN_ALLOWED_ORIGINS: {}. Skipping", o);
                None
            }
        })
        .collect()
}

/// A 32-byte value is used verbatim. Any other non-empty value is replaced by
/// the first 32 hex characters of its SHA-256. An empty or missing value hashes
/// the fallback material instead.
fn derive_encryption_key(configured: Option<&str>) -> ([u8; 32], KeySource) {
    let configured = configured.unwrap_or_default();
    if let Ok(key) = <[u8; 32]>::try_from(configured.as_bytes()) {
        return (key, KeySource::Configured);
    }

    let (material, source) = if configured.is_empty() {
        (FALLBACK_KEY_MATERIAL, KeySource::Fallback)
    } else {
        (configured, KeySource::Derived)
    };
    let digest = sha256_hex(material.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest.as_bytes()[..32]);
    (key, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PasskeyConfig::from_lookup(|_| None).unwrap();

        assert_eq!(config.rp_id, "localhost");
        assert_eq!(config.rp_name, "Site-Wise");
        assert_eq!(
            config.allowed_origins,
            vec!["http://127.0.0.1:5173", "https://app.sitewise.com"]
        );
        assert_eq!(config.verifier_url.as_str(), "http://localhost:8787/");
        assert_eq!(config.verifier_timeout, StdDuration::from_secs(10));
        assert_eq!(config.challenge_ttl, Duration::minutes(5));
        assert_eq!(config.ceremony_timeout_ms, 60_000);
        assert_eq!(config.registration_limit.max_attempts, 10);
        assert_eq!(config.authentication_limit.max_attempts, 20);
        assert_eq!(config.registration_limit.window, Duration::minutes(5));
        assert_eq!(config.sweep_batch, 100);
        assert_eq!(config.key_source, KeySource::Fallback);
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        let config = PasskeyConfig::from_lookup(lookup_from(&[
            ("PASSKEY_REGISTRATION_RATE_LIMIT", "lots"),
            ("PASSKEY_CHALLENGE_TTL", "0"),
            ("PASSKEY_SWEEP_BATCH", "-5"),
            ("PASSKEY_AUTHENTICATION_RATE_LIMIT", " 7 "),
        ]))
        .unwrap();

        assert_eq!(config.registration_limit.max_attempts, 10);
        assert_eq!(config.challenge_ttl, Duration::seconds(300));
        assert_eq!(config.sweep_batch, 100);
        assert_eq!(config.authentication_limit.max_attempts, 7);
    }

    #[test]
    fn test_origins_are_trimmed_and_invalid_entries_skipped() {
        let config = PasskeyConfig::from_lookup(lookup_from(&[(
            "WEBAUTHN_ALLOWED_ORIGINS",
            " https://a.example.com/ , not a url,, http://localhost:3000",
        )]))
        .unwrap();

        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example.com", "http://localhost:3000"]
        );
    }

    #[test]
    fn test_invalid_verifier_url_is_rejected() {
        let result =
            PasskeyConfig::from_lookup(lookup_from(&[("WEBAUTHN_VERIFIER_URL", "::nope::")]));
        assert!(matches!(result, Err(PasskeyError::Config(_))));
    }

    #[test]
    fn test_exact_32_byte_key_is_used_verbatim() {
        let raw = "0123456789abcdef0123456789abcdef";
        let (key, source) = derive_encryption_key(Some(raw));
        assert_eq!(source, KeySource::Configured);
        assert_eq!(&key, raw.as_bytes());
    }

    #[test]
    fn test_short_key_is_derived() {
        let (key, source) = derive_encryption_key(Some("short"));
        let expected = sha256_hex(b"short");
        assert_eq!(source, KeySource::Derived);
        assert_eq!(&key[..], &expected.as_bytes()[..32]);
    }

    #[test]
    fn test_missing_key_uses_fallback_material() {
        let (key, source) = derive_encryption_key(None);
        let expected = sha256_hex(b"default-key-change-me");
        assert_eq!(source, KeySource::Fallback);
        assert_eq!(&key[..], &expected.as_bytes()[..32]);
    }

    #[test]
    fn test_empty_key_matches_missing_key() {
        // Given an operator who set the variable to an empty string
        let (empty, source) = derive_encryption_key(Some(""));

        // Then the fallback material is hashed, not an empty string
        let (missing, _) = derive_encryption_key(None);
        assert_eq!(source, KeySource::Fallback);
        assert_eq!(empty, missing);
        assert_ne!(&empty[..], &sha256_hex(b"").as_bytes()[..32]);
    }

    #[test]
    fn test_fallback_key_refused_in_production() {
        let result = PasskeyConfig::from_lookup(lookup_from(&[("SITEWISE_ENV", "production")]));
        assert!(matches!(result, Err(PasskeyError::Config(_))));

        let result = PasskeyConfig::from_lookup(lookup_from(&[
            ("SITEWISE_ENV", "production"),
            ("WEBAUTHN_ENCRYPTION_KEY", "0123456789abcdef0123456789abcdef"),
        ]));
        assert!(result.is_ok());
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let config = PasskeyConfig::from_lookup(lookup_from(&[(
            "WEBAUTHN_VERIFIER_API_KEY",
            "super-secret-api-key",
        )]))
        .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret-api-key"));
        assert!(!rendered.contains("encryption_key"));
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        // Given a relying party configured through the environment
        unsafe {
            env::set_var("WEBAUTHN_RP_ID", "sitewise.test");
            env::set_var("PASSKEY_RATE_LIMIT_WINDOW", "60");
        }

        // When the configuration is loaded
        let config = PasskeyConfig::from_env();

        unsafe {
            env::remove_var("WEBAUTHN_RP_ID");
            env::remove_var("PASSKEY_RATE_LIMIT_WINDOW");
        }

        // Then the values are picked up
        let config = config.unwrap();
        assert_eq!(config.rp_id, "sitewise.test");
        assert_eq!(config.registration_limit.window, Duration::seconds(60));
        assert_eq!(config.authentication_limit.window, Duration::seconds(60));
    }
}
