//! Headered event envelopes.
//!
//! Some publishers wrap events as `{"header": {...}, "body": "<base64>"}`
//! instead of the SNS notification shape. The header carries its own signing
//! metadata and an optional `keyId`/`iv` pair for encrypted bodies.
//!
//! The signing string holds header values only, one per line, in this order:
//! `contentType, [iv, keyId], messageContext, messageId, messageType, sender,
//! signingCertUrl, timestamp, version, body`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DecodeError, DecodeResult};
use crate::types::InnerPayload;

/// Header of a headered event envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHeader {
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    pub message_context: String,
    pub message_id: String,
    pub message_type: String,
    pub sender: String,
    pub signing_cert_url: String,
    pub signature: String,
    pub timestamp: String,
    pub version: String,
}

/// `{"header": ..., "body": ...}` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderedMessage {
    pub header: EventHeader,
    /// Base64 payload, possibly encrypted.
    pub body: String,
}

impl HeaderedMessage {
    /// Whether `value` has the headered shape (a top-level `header` object).
    pub fn detect(value: &Value) -> bool {
        value.get("header").is_some_and(Value::is_object)
    }

    pub fn from_value(value: Value) -> DecodeResult<Self> {
        serde_json::from_value(value).map_err(|e| DecodeError::malformed(e.to_string()))
    }

    pub fn message_id(&self) -> &str {
        &self.header.message_id
    }

    /// Both `keyId` and `iv` are present.
    pub fn is_encrypted(&self) -> bool {
        self.header.key_id.is_some() && self.header.iv.is_some()
    }

    /// Canonical signing string.
    pub fn signing_string(&self) -> DecodeResult<String> {
        let h = &self.header;
        let mut out = String::new();

        push_line(&mut out, &h.content_type);
        if let Some(key_id) = &h.key_id {
            let iv = h
                .iv
                .as_deref()
                .ok_or_else(|| DecodeError::malformed("keyId without iv"))?;
            push_line(&mut out, iv);
            push_line(&mut out, key_id);
        }
        for value in [
            &h.message_context,
            &h.message_id,
            &h.message_type,
            &h.sender,
            &h.signing_cert_url,
            &h.timestamp,
            &h.version,
            &self.body,
        ] {
            push_line(&mut out, value);
        }

        Ok(out)
    }
}

fn push_line(out: &mut String, value: &str) {
    out.push_str(value);
    out.push('\n');
}

/// Interpret decoded body bytes according to `contentType`.
pub fn parse_content(content_type: &str, body: &[u8]) -> DecodeResult<InnerPayload> {
    if content_type.eq_ignore_ascii_case("json") {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| DecodeError::payload(format!("invalid JSON body: {}", e)))?;
        return Ok(InnerPayload::Json(value));
    }

    Err(DecodeError::UnsupportedContentType {
        content_type: content_type.to_string(),
    })
}
