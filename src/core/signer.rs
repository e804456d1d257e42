use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::config::SigningConfig;
use super::error::ConfigError;
use super::types::now_epoch_millis;

type HmacSha256 = Hmac<Sha256>;

/// A freshly issued stream token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Expiry as epoch milliseconds.
    pub expiry_ms: i64,
    /// URL-safe, unpadded base64 HMAC over `location|expiry`.
    pub signature: String,
}

/// Issues and verifies HMAC-SHA256 signed, expiring stream tokens.
///
/// Tokens are stateless: `{location, expiry, signature}` is self-contained,
/// so any process holding the shared secret can verify tokens issued
/// elsewhere. Verification is a pure function with no I/O.
pub struct UrlSigner {
    secret: Vec<u8>,
    url_ttl_secs: u64,
}

impl UrlSigner {
    /// Build a signer from config. Fails fast on an empty secret so a
    /// misconfigured process never issues unverifiable URLs.
    pub fn new(config: &SigningConfig) -> Result<Self, ConfigError> {
        if config.secret.trim().is_empty() {
            return Err(ConfigError::MissingSigningSecret);
        }
        Ok(Self {
            secret: config.secret.as_bytes().to_vec(),
            url_ttl_secs: config.url_ttl_secs,
        })
    }

    /// Deterministic keyed MAC over an arbitrary message, URL-safe encoded.
    pub fn sign(&self, message: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(message.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Issue a token for a file location using the configured TTL.
    pub fn issue(&self, location: &str) -> IssuedToken {
        self.issue_at(now_epoch_millis(), location)
    }

    fn issue_at(&self, now_ms: i64, location: &str) -> IssuedToken {
        let expiry_ms = now_ms + (self.url_ttl_secs as i64) * 1000;
        let signature = self.sign(&canonical(location, expiry_ms));
        IssuedToken {
            expiry_ms,
            signature,
        }
    }

    /// Verify a presented token: current time must not exceed `exp_ms` and
    /// the recomputed MAC must equal the presented signature. The MAC
    /// comparison runs in constant time via `Mac::verify_slice`.
    pub fn verify(&self, location: &str, exp_ms: i64, sig: &str) -> bool {
        self.verify_at(now_epoch_millis(), location, exp_ms, sig)
    }

    fn verify_at(&self, now_ms: i64, location: &str, exp_ms: i64, sig: &str) -> bool {
        if now_ms > exp_ms {
            return false;
        }
        let Ok(presented) = URL_SAFE_NO_PAD.decode(sig) else {
            return false;
        };
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(canonical(location, exp_ms).as_bytes());
        mac.verify_slice(&presented).is_ok()
    }
}

/// Canonical string covered by the signature.
fn canonical(location: &str, expiry_ms: i64) -> String {
    format!("{}|{}", location, expiry_ms)
}
