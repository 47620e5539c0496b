//! Wire types for SNS notification envelopes and decoded payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only signature scheme accepted.
pub const SIGNATURE_VERSION_1: &str = "1";

/// SNS message type (`Type` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Notification,
    SubscriptionConfirmation,
    UnsubscribeConfirmation,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notification => "Notification",
            Self::SubscriptionConfirmation => "SubscriptionConfirmation",
            Self::UnsubscribeConfirmation => "UnsubscribeConfirmation",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outer SNS envelope as delivered through SQS.
///
/// Field names are bit-exact with the SNS JSON format. `Message` is kept as a
/// raw JSON value because publishers may nest a structure instead of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationHeader {
    #[serde(rename = "Type")]
    pub message_type: MessageType,

    #[serde(rename = "MessageId")]
    pub message_id: String,

    #[serde(rename = "TopicArn")]
    pub topic_arn: String,

    #[serde(rename = "Subject", default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(rename = "Message")]
    pub message: Value,

    #[serde(rename = "Timestamp")]
    pub timestamp: String,

    #[serde(
        rename = "SignatureVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub signature_version: Option<String>,

    /// Base64 RSA signature over the canonical signing string.
    #[serde(rename = "Signature", default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    #[serde(
        rename = "SigningCertURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub signing_cert_url: Option<String>,

    #[serde(
        rename = "SubscribeURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub subscribe_url: Option<String>,

    /// Historical spelling, folded into `subscribe_url` when that is absent.
    #[serde(rename = "Subscribe URL", default, skip_serializing)]
    legacy_subscribe_url: Option<String>,

    #[serde(rename = "Token", default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(
        rename = "UnsubscribeURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub unsubscribe_url: Option<String>,

    /// Encryption key reference; with `iv`, marks the payload as encrypted.
    #[serde(rename = "keyId", default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,

    /// Base64 AES initialization vector.
    #[serde(rename = "iv", default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
}

impl NotificationHeader {
    /// Parse an envelope from its JSON value.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let mut header: Self = serde_json::from_value(value)?;
        let legacy = header.legacy_subscribe_url.take();
        if header.subscribe_url.is_none() {
            header.subscribe_url = legacy;
        }
        Ok(header)
    }

    /// `Message` rendered as the text that was signed. Structured messages
    /// keep the key order they arrived with.
    pub fn message_text(&self) -> String {
        match &self.message {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }

    /// Both `keyId` and `iv` are present.
    pub fn is_encrypted(&self) -> bool {
        self.key_id.is_some() && self.iv.is_some()
    }
}

/// Decoded business content handed to the processor.
#[derive(Debug, Clone, PartialEq)]
pub enum InnerPayload {
    /// Structured JSON value.
    Json(Value),
    /// Text that is not JSON, returned verbatim.
    Text(String),
    /// Decrypted plaintext that is not JSON.
    Bytes(Vec<u8>),
}

impl InnerPayload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Render as a JSON value (text as string, bytes as lossy UTF-8 string).
    pub fn to_json(&self) -> Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Text(text) => Value::String(text.clone()),
            Self::Bytes(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

/// Subscription confirmation surfaced for out-of-band handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub message_id: String,
    pub topic_arn: String,
    pub subscribe_url: String,
    #[serde(default)]
    pub token: Option<String>,
}

/// Outcome of authenticating and classifying one envelope.
///
/// Hard rejections are `Err(DecodeError)`; everything here is an expected
/// outcome after which the message may be acknowledged.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Hand the payload to the processor.
    Deliver(InnerPayload),

    /// Subscription confirmation; never a business payload.
    Subscription(SubscriptionRequest),

    /// Unsubscribe confirmation; informational only.
    Unsubscribed { topic_arn: String },

    /// Envelope came from a topic other than the expected one.
    TopicMismatch { expected: String, actual: String },
}
