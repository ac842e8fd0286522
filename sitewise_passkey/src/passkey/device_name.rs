use super::errors::PasskeyError;

const MAX_DEVICE_NAME_CHARS: usize = 100;
pub(crate) const DEFAULT_DEVICE_NAME: &str = "Unknown Device";

fn is_devanagari(c: char) -> bool {
    ('\u{0900}'..='\u{097F}').contains(&c)
}

fn is_allowed_punctuation(c: char) -> bool {
    matches!(c, '-' | '_' | '(' | ')' | '.' | ',' | '\'')
}

/// Rejects names that are too long or contain characters outside the allowlist.
/// An empty name is valid and later replaced by the default.
pub fn validate_device_name(name: &str) -> Result<(), PasskeyError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Ok(());
    }

    if trimmed.chars().count() > MAX_DEVICE_NAME_CHARS {
        return Err(PasskeyError::InvalidRequest(
            "Device name must be less than 100 characters".to_string(),
        ));
    }

    // The allowlist excludes '<', '>', ':' and '=', so markup and inline
    // script handlers cannot pass.
    let allowed = trimmed.chars().all(|c| {
        c.is_ascii_alphanumeric() || c.is_whitespace() || is_allowed_punctuation(c) || is_devanagari(c)
    });
    if !allowed {
        return Err(PasskeyError::InvalidRequest(
            "Device name contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

/// Normalizes a client-supplied name for storage.
pub fn sanitize_device_name(name: Option<&str>) -> String {
    let cleaned: String = name
        .unwrap_or_default()
        .trim()
        .chars()
        .take(MAX_DEVICE_NAME_CHARS)
        .filter(|&c| {
            c.is_ascii_alphanumeric() || c == ' ' || is_allowed_punctuation(c) || is_devanagari(c)
        })
        .collect();

    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        DEFAULT_DEVICE_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}
