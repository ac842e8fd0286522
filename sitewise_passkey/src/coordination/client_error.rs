use serde::Deserialize;

/// A browser-side ceremony failure reported back by the client.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientCeremonyFailure {
    /// `"registration"` or `"authentication"`, when the client knows
    #[serde(default)]
    pub ceremony: Option<String>,
    /// The DOMException name, e.g. `NotAllowedError`
    pub name: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientFailureKind {
    /// The user dismissed the prompt or the ceremony timed out.
    Cancelled,
    Error,
}

const CANCELLATION_NAMES: [&str; 2] = ["NotAllowedError", "AbortError"];

const MAX_LOGGED_CHARS: usize = 200;

fn truncated(s: &str) -> String {
    s.chars().take(MAX_LOGGED_CHARS).collect()
}

/// Logs a client ceremony failure. Cancellations stay at debug level.
pub fn report_client_failure(
    failure: &ClientCeremonyFailure,
    origin_ip: Option<&str>,
) -> ClientFailureKind {
    let ceremony = truncated(failure.ceremony.as_deref().unwrap_or("unknown"));
    let name = truncated(&failure.name);
    let message = truncated(&failure.message);

    if CANCELLATION_NAMES.contains(&failure.name.as_str()) {
        tracing::debug!(
            ceremony = %ceremony,
            name = %name,
            "Passkey ceremony cancelled by user"
        );
        return ClientFailureKind::Cancelled;
    }

    tracing::warn!(
        event = "passkey_client_error",
        ceremony = %ceremony,
        name = %name,
        client_ip = origin_ip.unwrap_or_default(),
        "Passkey ceremony failed in the browser: {}",
        message
    );
    ClientFailureKind::Error
}
