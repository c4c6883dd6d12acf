//! Payment types shared by the gateway adapter and notification handling.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Lifecycle status reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Cancelled,
    Refunded,
    #[default]
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    pub fn is_final(self) -> bool {
        matches!(
            self,
            PaymentStatus::Succeeded
                | PaymentStatus::Failed
                | PaymentStatus::Cancelled
                | PaymentStatus::Refunded
        )
    }
}

/// A request to open a payment with the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Amount in the currency's minor unit.
    pub amount_minor: u64,
    pub currency: String,
    /// Merchant-side reference, used as the idempotency key.
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// A payment as known to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(alias = "id")]
    pub payment_id: String,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub amount_minor: u64,
    #[serde(default)]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
}

/// Typed view over a validated notification body.
///
/// Gateways disagree on field names, so the common aliases are accepted and
/// the complete body is kept in `raw`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentNotification {
    #[serde(default, alias = "type", alias = "event_type")]
    pub event: String,
    #[serde(default, alias = "id", alias = "transaction_id")]
    pub payment_id: String,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(skip)]
    pub raw: serde_json::Value,
}

impl PaymentNotification {
    /// Parse a notification body. Fails only on malformed JSON or a non-object.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: serde_json::Value = serde_json::from_slice(body)?;
        let mut notification: PaymentNotification = serde_json::from_value(raw.clone())?;
        notification.raw = raw;
        Ok(notification)
    }
}

/// A validated notification waiting for dispatch.
#[derive(Debug, Clone)]
pub struct ValidatedNotification {
    pub source_ip: String,
    pub received_at_ms: u64,
    pub body: Bytes,
}
