use std::fmt;

// ---------------------------------------------------------------------------
// Sensitive field redaction
// ---------------------------------------------------------------------------

/// A wrapper that redacts its contents when displayed or debug-printed.
///
/// Usage:
/// ```ignore
/// let secret = Redacted::new(&config.signing.secret);
/// tracing::info!(secret = %secret, "signer ready"); // logs: secret=[REDACTED]
/// ```
#[derive(Clone)]
pub struct Redacted<T>(T);

impl<T> Redacted<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }
}

impl<T> fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T> fmt::Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Redact a presented stream-URL signature for logging: first 6 chars only.
/// The value comes straight from a query parameter, so slicing must stay
/// on char boundaries.
pub fn redact_signature(sig: &str) -> String {
    let mut chars = sig.chars();
    let prefix: String = chars.by_ref().take(6).collect();
    if chars.next().is_none() {
        return "****".to_string();
    }
    format!("{}***", prefix)
}
