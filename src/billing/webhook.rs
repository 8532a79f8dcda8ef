//! Billing provider webhook: signature check and event decoding.
//!
//! Payloads follow the Lemon Squeezy subscription event shape. Only the
//! fields needed to move a profile between tiers are decoded.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use crate::profiles::repo_types::{StatusUpdate, SubscriptionStatus};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Invalid signature.")]
    InvalidSignature,
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Checks a hex HMAC-SHA256 of the raw body. The comparison runs in
/// constant time via `verify_slice`.
pub fn verify_signature(body: &[u8], signature_hex: &str, secret: &str) -> Result<(), WebhookError> {
    if secret.is_empty() {
        return Err(WebhookError::InvalidSignature);
    }
    let expected =
        hex::decode(signature_hex.trim()).map_err(|_| WebhookError::InvalidSignature)?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::InvalidSignature)
}

#[derive(Debug, Deserialize)]
struct Envelope {
    meta: Meta,
    data: Data,
}

#[derive(Debug, Deserialize)]
struct Meta {
    event_name: String,
}

#[derive(Debug, Deserialize)]
struct Data {
    id: Option<StringOrNumber>,
    attributes: Attributes,
}

#[derive(Debug, Deserialize)]
struct Attributes {
    user_email: Option<String>,
    status: Option<String>,
    variant_id: Option<StringOrNumber>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Num(serde_json::Number),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::Str(s) => s,
            StringOrNumber::Num(n) => n.to_string(),
        }
    }
}

/// What a verified event asks the store to do.
#[derive(Debug, PartialEq, Eq)]
pub enum BillingEvent {
    StatusChange { email: String, update: StatusUpdate },
    Ignored { event_name: String },
}

const STATUS_EVENTS: &[&str] = &["subscription_created", "subscription_updated"];

/// Decodes a body that already passed `verify_signature`.
pub fn parse_event(body: &[u8]) -> Result<BillingEvent, WebhookError> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
    let event_name = envelope.meta.event_name;
    if !STATUS_EVENTS.contains(&event_name.as_str()) {
        return Ok(BillingEvent::Ignored { event_name });
    }

    let attrs = envelope.data.attributes;
    let email = attrs
        .user_email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| WebhookError::InvalidPayload("missing user_email".into()))?;
    let status = attrs
        .status
        .ok_or_else(|| WebhookError::InvalidPayload("missing status".into()))?;

    Ok(BillingEvent::StatusChange {
        email,
        update: StatusUpdate {
            status: map_provider_status(&status),
            billing_customer_id: envelope.data.id.map(StringOrNumber::into_string),
            billing_plan_id: attrs.variant_id.map(StringOrNumber::into_string),
        },
    })
}

pub fn map_provider_status(status: &str) -> SubscriptionStatus {
    match status {
        "active" | "on_trial" => SubscriptionStatus::Pro,
        "past_due" | "unpaid" => SubscriptionStatus::PastDue,
        "cancelled" | "expired" => SubscriptionStatus::Canceled,
        _ => SubscriptionStatus::Free,
    }
}

#[cfg(test)]
pub(crate) fn sign(body: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
