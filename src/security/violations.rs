//! Webhook security violation taxonomy.

use serde::{Deserialize, Serialize};

use crate::resilience::classifier::Severity;

/// Why an inbound notification was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    PayloadTooLarge,
    IpNotAllowed,
    RateLimited,
    StaleTimestamp,
    ReplayDetected,
    InvalidSignature,
}

impl ViolationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationKind::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ViolationKind::IpNotAllowed => "IP_NOT_ALLOWED",
            ViolationKind::RateLimited => "RATE_LIMITED",
            ViolationKind::StaleTimestamp => "STALE_TIMESTAMP",
            ViolationKind::ReplayDetected => "REPLAY_DETECTED",
            ViolationKind::InvalidSignature => "INVALID_SIGNATURE",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            ViolationKind::ReplayDetected | ViolationKind::InvalidSignature => Severity::Critical,
            ViolationKind::IpNotAllowed | ViolationKind::StaleTimestamp => Severity::High,
            ViolationKind::PayloadTooLarge | ViolationKind::RateLimited => Severity::Medium,
        }
    }

    /// Human-readable rejection reason.
    pub fn reason(self) -> &'static str {
        match self {
            ViolationKind::PayloadTooLarge => "payload exceeds maximum size",
            ViolationKind::IpNotAllowed => "source IP not in allow-list",
            ViolationKind::RateLimited => "rate limit exceeded",
            ViolationKind::StaleTimestamp => "timestamp outside tolerance",
            ViolationKind::ReplayDetected => "replay detected",
            ViolationKind::InvalidSignature => "invalid signature",
        }
    }

    /// Suggested operator actions.
    pub fn mitigation(self) -> &'static [&'static str] {
        match self {
            ViolationKind::PayloadTooLarge => &[
                "check the gateway's notification format",
                "raise webhook.max_payload_bytes only if legitimate payloads grew",
            ],
            ViolationKind::IpNotAllowed => &[
                "verify the gateway's published source ranges",
                "block the source at the network edge if unknown",
            ],
            ViolationKind::RateLimited => &[
                "check for a redelivery storm from the gateway",
                "block the source if traffic is not from the gateway",
            ],
            ViolationKind::StaleTimestamp => &[
                "check clock synchronisation on both sides",
                "treat repeated stale deliveries as a possible replay",
            ],
            ViolationKind::ReplayDetected => &[
                "block the source IP",
                "audit recent notifications for duplicated processing",
            ],
            ViolationKind::InvalidSignature => &[
                "verify the shared secret matches the gateway dashboard",
                "rotate the secret if it may have leaked",
                "block the source IP if failures persist",
            ],
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severities() {
        assert_eq!(ViolationKind::ReplayDetected.severity(), Severity::Critical);
        assert_eq!(ViolationKind::InvalidSignature.severity(), Severity::Critical);
        assert_eq!(ViolationKind::IpNotAllowed.severity(), Severity::High);
        assert_eq!(ViolationKind::StaleTimestamp.severity(), Severity::High);
        assert_eq!(ViolationKind::PayloadTooLarge.severity(), Severity::Medium);
        assert_eq!(ViolationKind::RateLimited.severity(), Severity::Medium);
    }

    #[test]
    fn test_every_kind_has_mitigation() {
        for kind in [
            ViolationKind::PayloadTooLarge,
            ViolationKind::IpNotAllowed,
            ViolationKind::RateLimited,
            ViolationKind::StaleTimestamp,
            ViolationKind::ReplayDetected,
            ViolationKind::InvalidSignature,
        ] {
            assert!(!kind.mitigation().is_empty());
        }
    }
}
