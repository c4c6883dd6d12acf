//! HMAC signatures over webhook payloads.
//!
//! The signed message is `timestamp + "." + raw_payload`; the signature is the
//! lowercase hex HMAC digest, optionally prefixed with the algorithm name
//! (`sha256=...`) by the sender.

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("unsupported signature algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("invalid HMAC key: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl SignatureAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha256 => "sha256",
            SignatureAlgorithm::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" | "hmac-sha256" => Ok(SignatureAlgorithm::Sha256),
            "sha512" | "hmac-sha512" => Ok(SignatureAlgorithm::Sha512),
            other => Err(SignatureError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Hex HMAC of `timestamp.payload`.
pub fn compute_signature(
    algorithm: SignatureAlgorithm,
    secret: &[u8],
    timestamp: &str,
    payload: &[u8],
) -> Result<String, SignatureError> {
    let digest = match algorithm {
        SignatureAlgorithm::Sha256 => {
            let mut mac = HmacSha256::new_from_slice(secret)
                .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
            mac.update(timestamp.as_bytes());
            mac.update(b".");
            mac.update(payload);
            mac.finalize().into_bytes().to_vec()
        }
        SignatureAlgorithm::Sha512 => {
            let mut mac = HmacSha512::new_from_slice(secret)
                .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
            mac.update(timestamp.as_bytes());
            mac.update(b".");
            mac.update(payload);
            mac.finalize().into_bytes().to_vec()
        }
    };
    Ok(hex::encode(digest))
}

/// Check `provided` against the expected signature in constant time.
pub fn verify_signature(
    algorithm: SignatureAlgorithm,
    secret: &[u8],
    timestamp: &str,
    payload: &[u8],
    provided: &str,
) -> bool {
    let Ok(expected) = compute_signature(algorithm, secret, timestamp, payload) else {
        return false;
    };

    let provided = normalize_signature(algorithm, provided);
    constant_time_eq(expected.as_bytes(), provided.as_bytes())
}

/// Canonical form of a signature header: trimmed, without an
/// `<algorithm>=` prefix, lowercase hex.
pub fn normalize_signature(algorithm: SignatureAlgorithm, provided: &str) -> String {
    let provided = provided.trim().to_ascii_lowercase();
    match provided
        .strip_prefix(algorithm.as_str())
        .and_then(|rest| rest.strip_prefix('='))
    {
        Some(hex) => hex.to_string(),
        None => provided,
    }
}

/// Length check first, then a comparison over every byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
