//! Envelope authentication and payload decoding.
//!
//! An envelope goes through two phases:
//!
//! 1. **Authenticate**: check `SignatureVersion`, rebuild the canonical
//!    signing string, fetch the signing certificate and verify the RSA
//!    signature. Skipped when `validate_signature` is off.
//! 2. **Decode**: turn `Message` into an [`InnerPayload`], decrypting it
//!    when the envelope carries `keyId` and `iv`.
//!
//! [`EnvelopeDecoder::classify`] runs both and maps the envelope type to a
//! [`Disposition`].

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::canonical::signing_string;
use crate::cert_cache::CertificateCache;
use crate::cipher::Aes128Cbc;
use crate::config::GatherConfig;
use crate::error::{ConfigError, DecodeError, DecodeResult};
use crate::extract::{parse_content, HeaderedMessage};
use crate::http::transport_for;
use crate::types::{
    Disposition, InnerPayload, MessageType, NotificationHeader, SubscriptionRequest,
    SIGNATURE_VERSION_1,
};
use crate::verify::{verify_signature, VerificationContext};

/// Authenticates and decodes envelopes.
#[derive(Debug, Clone)]
pub struct EnvelopeDecoder {
    certificates: CertificateCache,
    keys: HashMap<String, Vec<u8>>,
    validate_signature: bool,
    expected_topic_arn: Option<String>,
}

impl EnvelopeDecoder {
    /// Build a decoder. The key table is decoded here so that a bad key is a
    /// configuration error rather than a per-message failure.
    pub fn new(config: &GatherConfig, certificates: CertificateCache) -> Result<Self, ConfigError> {
        Ok(Self {
            certificates,
            keys: config.decoded_keys()?,
            validate_signature: config.validate_signature,
            expected_topic_arn: config.expected_topic_arn.clone(),
        })
    }

    /// Build a decoder with its own certificate cache over the transport
    /// chosen by [`transport_for`].
    pub fn from_config(config: &GatherConfig) -> Result<Self, ConfigError> {
        let certificates = CertificateCache::with_ttl(
            transport_for(config)?,
            Duration::from_secs(config.certificate_ttl_secs),
        );
        Self::new(config, certificates)
    }

    pub fn certificates(&self) -> &CertificateCache {
        &self.certificates
    }

    /// Parse a raw queue body and classify it.
    pub async fn classify_body(&self, body: &str) -> DecodeResult<Disposition> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| DecodeError::malformed(format!("body is not JSON: {}", e)))?;
        self.classify(value).await
    }

    /// Authenticate, decode and classify one envelope.
    pub async fn classify(&self, value: Value) -> DecodeResult<Disposition> {
        if HeaderedMessage::detect(&value) {
            let message = HeaderedMessage::from_value(value)?;
            return self.decode_headered(&message).await.map(Disposition::Deliver);
        }

        let header = NotificationHeader::from_value(value)
            .map_err(|e| DecodeError::malformed(e.to_string()))?;

        if self.validate_signature {
            self.authenticate(&header).await?;
        }

        if let Some(expected) = &self.expected_topic_arn {
            if header.topic_arn != *expected {
                warn!(
                    message_id = %header.message_id,
                    expected = %expected,
                    actual = %header.topic_arn,
                    "envelope from unexpected topic"
                );
                return Ok(Disposition::TopicMismatch {
                    expected: expected.clone(),
                    actual: header.topic_arn,
                });
            }
        }

        match header.message_type {
            MessageType::Notification => self.extract_inner(&header).map(Disposition::Deliver),
            MessageType::SubscriptionConfirmation => {
                let subscribe_url = header
                    .subscribe_url
                    .ok_or_else(|| DecodeError::malformed("SubscriptionConfirmation without SubscribeURL"))?;
                Ok(Disposition::Subscription(SubscriptionRequest {
                    message_id: header.message_id,
                    topic_arn: header.topic_arn,
                    subscribe_url,
                    token: header.token,
                }))
            }
            MessageType::UnsubscribeConfirmation => Ok(Disposition::Unsubscribed {
                topic_arn: header.topic_arn,
            }),
        }
    }

    /// Authenticate an envelope of either shape without decoding it.
    pub async fn verify(&self, value: &Value) -> DecodeResult<()> {
        if HeaderedMessage::detect(value) {
            let message = HeaderedMessage::from_value(value.clone())?;
            return self.authenticate_headered(&message).await;
        }

        let header = NotificationHeader::from_value(value.clone())
            .map_err(|e| DecodeError::malformed(e.to_string()))?;
        self.authenticate(&header).await
    }

    /// Verify the envelope signature. Every failure is fatal for the envelope.
    pub async fn authenticate(&self, header: &NotificationHeader) -> DecodeResult<()> {
        let version = header.signature_version.as_deref().unwrap_or_default();
        if version != SIGNATURE_VERSION_1 {
            return Err(DecodeError::UnsupportedSignatureVersion {
                version: version.to_string(),
            });
        }

        let context = VerificationContext {
            message_id: &header.message_id,
            signature_version: version,
        };

        let canonical = signing_string(header).map_err(|e| context.fail(e.to_string()))?;
        let cert_url = header
            .signing_cert_url
            .as_deref()
            .ok_or_else(|| context.fail("missing signing field: SigningCertURL"))?;
        let signature = header
            .signature
            .as_deref()
            .ok_or_else(|| context.fail("missing signing field: Signature"))?;

        self.check_signature(cert_url, &canonical, signature, &context)
            .await
    }

    /// Decode the `Message` field into a payload.
    pub fn extract_inner(&self, header: &NotificationHeader) -> DecodeResult<InnerPayload> {
        let text = match &header.message {
            Value::String(text) => text,
            structured => return Ok(InnerPayload::Json(structured.clone())),
        };

        if let (Some(key_id), Some(iv)) = (&header.key_id, &header.iv) {
            let ciphertext = BASE64
                .decode(text.trim())
                .map_err(|e| DecodeError::payload(format!("encrypted Message is not base64: {}", e)))?;
            let plaintext = self.decrypt(key_id, iv, &ciphertext)?;
            return Ok(match serde_json::from_slice(&plaintext) {
                Ok(value) => InnerPayload::Json(value),
                Err(_) => InnerPayload::Bytes(plaintext),
            });
        }

        Ok(decode_text(text))
    }

    async fn decode_headered(&self, message: &HeaderedMessage) -> DecodeResult<InnerPayload> {
        let header = &message.header;

        if self.validate_signature {
            self.authenticate_headered(message).await?;
        }

        let mut body = BASE64
            .decode(message.body.trim())
            .map_err(|e| DecodeError::payload(format!("body is not base64: {}", e)))?;

        if let (Some(key_id), Some(iv)) = (&header.key_id, &header.iv) {
            body = self.decrypt(key_id, iv, &body)?;
        }

        parse_content(&header.content_type, &body)
    }

    async fn authenticate_headered(&self, message: &HeaderedMessage) -> DecodeResult<()> {
        let header = &message.header;
        let context = VerificationContext {
            message_id: &header.message_id,
            signature_version: &header.version,
        };
        let canonical = message.signing_string()?;
        self.check_signature(&header.signing_cert_url, &canonical, &header.signature, &context)
            .await
    }

    async fn check_signature(
        &self,
        cert_url: &str,
        canonical: &str,
        signature_b64: &str,
        context: &VerificationContext<'_>,
    ) -> DecodeResult<()> {
        let certificate = self.certificates.get(cert_url).await?;

        let signature = BASE64
            .decode(signature_b64.trim())
            .map_err(|e| context.fail(format!("Signature is not base64: {}", e)))?;

        verify_signature(&certificate, canonical.as_bytes(), &signature, context)?;
        debug!(message_id = %context.message_id, "signature verified");
        Ok(())
    }

    fn decrypt(&self, key_id: &str, iv_b64: &str, ciphertext: &[u8]) -> DecodeResult<Vec<u8>> {
        let key = self
            .keys
            .get(key_id)
            .ok_or_else(|| DecodeError::InvalidKeyReference {
                key_id: key_id.to_string(),
            })?;
        let iv = BASE64
            .decode(iv_b64.trim())
            .map_err(|e| DecodeError::payload(format!("iv is not base64: {}", e)))?;

        Ok(Aes128Cbc::new(Some(key), Some(&iv))?.decrypt(ciphertext)?)
    }
}

/// Message id of a raw envelope of either shape, for logging.
pub fn message_id_of(value: &Value) -> Option<&str> {
    value
        .get("MessageId")
        .or_else(|| value.get("header").and_then(|h| h.get("messageId")))
        .and_then(Value::as_str)
}

fn base64_text() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9+/]+={0,2}$").expect("static regex"))
}

fn looks_like_base64(text: &str) -> bool {
    text.len() % 4 == 0 && base64_text().is_match(text)
}

/// Plain-text `Message`: base64-wrapped JSON, bare JSON, or literal text.
///
/// Text in the base64 alphabet is only ever read as base64; when the decoded
/// bytes are not JSON the original text is returned as is.
fn decode_text(text: &str) -> InnerPayload {
    if looks_like_base64(text) {
        return match BASE64.decode(text).map(|bytes| serde_json::from_slice::<Value>(&bytes)) {
            Ok(Ok(value)) => InnerPayload::Json(value),
            _ => InnerPayload::Text(text.to_string()),
        };
    }

    match serde_json::from_str(text) {
        Ok(value) => InnerPayload::Json(value),
        Err(_) => InnerPayload::Text(text.to_string()),
    }
}
