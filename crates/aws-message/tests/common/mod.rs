//! Shared fixtures: a throwaway RSA signer with a self-signed certificate,
//! an in-memory certificate transport, queue and processor.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use aws_message::{
    signing_string, Aes128Cbc, CertificateTransport, Envelope, FetchRequest, HeaderedMessage,
    HttpResponse, InnerPayload, MessageProcessor, NotificationHeader, ProcessorError,
    QueueTransport, TransportError,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer as _};
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use sha1::Sha1;

pub const CERT_URL: &str =
    "https://sns.us-west-2.amazonaws.com/SimpleNotificationService-0000000000000000000000.pem";
pub const TOPIC_ARN: &str = "arn:aws:sns:us-west-2:000000000000:uw-event";
pub const QUEUE_ARN: &str = "arn:aws:sqs:us-west-2:000000000000:uw-event-queue";
pub const KEY_B64: &str = "MDEyMzQ1Njc4OWFiY2RlZg==";
pub const IV: &[u8; 16] = b"fedcba9876543210";

/// RSA key and matching self-signed PEM certificate.
pub struct Signer {
    key: SigningKey<Sha1>,
    pub certificate_pem: String,
}

impl Signer {
    pub fn sign(&self, data: &[u8]) -> String {
        BASE64.encode(self.key.sign(data).to_bytes())
    }
}

/// Key generation is slow; every test shares one signer.
pub fn signer() -> &'static Signer {
    static SIGNER: OnceLock<Signer> = OnceLock::new();
    SIGNER.get_or_init(|| {
        let private_key =
            RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("generate RSA key");
        let pkcs8 = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("encode PKCS#8");

        let key_pair = rcgen::KeyPair::from_pem_and_sign_algo(&pkcs8, &rcgen::PKCS_RSA_SHA256)
            .expect("load key into rcgen");
        let certificate = rcgen::CertificateParams::new(vec!["sns.us-west-2.amazonaws.com".to_string()])
            .expect("certificate params")
            .self_signed(&key_pair)
            .expect("self-sign certificate");

        Signer {
            key: SigningKey::<Sha1>::new(private_key),
            certificate_pem: certificate.pem(),
        }
    })
}

/// Unsigned notification envelope.
pub fn notification(message_id: &str, message: Value) -> Value {
    json!({
        "Type": "Notification",
        "MessageId": message_id,
        "TopicArn": TOPIC_ARN,
        "Subject": "UW Event",
        "Message": message,
        "Timestamp": "2020-01-01T00:00:00Z",
        "SignatureVersion": "1",
        "SigningCertURL": CERT_URL,
        "UnsubscribeURL": "https://sns.us-west-2.amazonaws.com/?Action=Unsubscribe",
    })
}

/// Set `Signature` over the canonical signing string of `envelope`.
pub fn sign(mut envelope: Value) -> Value {
    let header = NotificationHeader::from_value(envelope.clone()).expect("valid envelope");
    let canonical = signing_string(&header).expect("signing fields present");
    envelope["Signature"] = json!(signer().sign(canonical.as_bytes()));
    envelope
}

/// Signed notification carrying `message`.
pub fn signed_notification(message_id: &str, message: Value) -> Value {
    sign(notification(message_id, message))
}

/// Signed notification with an AES-128-CBC encrypted message under `k1`.
pub fn signed_encrypted_notification(message_id: &str, plaintext: &[u8]) -> Value {
    let key = BASE64.decode(KEY_B64).unwrap();
    let ciphertext = Aes128Cbc::new(Some(&key), Some(IV))
        .unwrap()
        .encrypt(plaintext)
        .unwrap();

    let mut envelope = notification(message_id, json!(BASE64.encode(ciphertext)));
    envelope["keyId"] = json!("k1");
    envelope["iv"] = json!(BASE64.encode(IV));
    sign(envelope)
}

/// Signed subscription confirmation.
pub fn signed_subscription(message_id: &str, subscribe_url: &str) -> Value {
    sign(json!({
        "Type": "SubscriptionConfirmation",
        "MessageId": message_id,
        "TopicArn": TOPIC_ARN,
        "Message": "You have chosen to subscribe to the topic",
        "Timestamp": "2020-01-01T00:00:00Z",
        "SignatureVersion": "1",
        "SigningCertURL": CERT_URL,
        "SubscribeURL": subscribe_url,
        "Token": "2336412f37fb687f5d51e6e241d09c805a5a57b30d712f794cc5f6a988666d92768dd60a747ba6f3beb71854e285d6ad02428b09ceece29417f1f02d609c582afbacc99c583a916b9981dd2728f4ae6fdb82efd087cc3b7849e05798d2d2785c03b0879594eeac82c01f235d0e717736",
    }))
}

/// Signed headered event envelope with a base64 JSON body.
pub fn signed_headered(message_id: &str, body: &Value) -> Value {
    let mut envelope = json!({
        "header": {
            "contentType": "json",
            "messageContext": BASE64.encode(br#"{"Action":"UPDATE"}"#),
            "messageId": message_id,
            "messageType": "uw-person-change-v1",
            "sender": "IdentityRegistry",
            "signingCertUrl": CERT_URL,
            "signature": "",
            "timestamp": "2024-03-01T12:00:00.000Z",
            "version": "UWIT-1"
        },
        "body": BASE64.encode(body.to_string()),
    });
    let message = HeaderedMessage::from_value(envelope.clone()).unwrap();
    let canonical = message.signing_string().unwrap();
    envelope["header"]["signature"] = json!(signer().sign(canonical.as_bytes()));
    envelope
}

/// Flip one byte of the decoded signature.
pub fn tamper_signature(mut envelope: Value) -> Value {
    let mut raw = BASE64
        .decode(envelope["Signature"].as_str().unwrap())
        .unwrap();
    raw[0] ^= 0x01;
    envelope["Signature"] = json!(BASE64.encode(raw));
    envelope
}

/// In-memory certificate transport serving the shared signer's certificate.
#[derive(Debug, Default)]
pub struct StaticCertificates {
    documents: HashMap<String, (u16, Vec<u8>)>,
    calls: AtomicUsize,
}

impl StaticCertificates {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default().with(CERT_URL, 200, signer().certificate_pem.as_bytes()))
    }

    pub fn with(mut self, url: &str, status: u16, body: &[u8]) -> Self {
        self.documents
            .insert(url.to_string(), (status, body.to_vec()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateTransport for StaticCertificates {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(match self.documents.get(url) {
            Some((status, body)) => HttpResponse {
                status: *status,
                body: body.clone(),
            },
            None => HttpResponse {
                status: 404,
                body: Vec::new(),
            },
        })
    }
}

/// Queue over a fixed list of bodies. Fetched messages leave the queue;
/// acked handles are recorded.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    pub pending: Mutex<VecDeque<Envelope>>,
    pub fetch_sizes: Mutex<Vec<usize>>,
    pub acked: Mutex<Vec<String>>,
    pub fail_fetch: bool,
    pub fail_ack: bool,
}

impl MemoryQueue {
    pub fn with_bodies<I, S>(bodies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pending = bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| Envelope {
                body: body.into(),
                handle: format!("receipt-{}", i),
            })
            .collect();
        Self {
            pending: Mutex::new(pending),
            ..Self::default()
        }
    }

    pub fn acked(&self) -> Vec<String> {
        self.acked.lock().unwrap().clone()
    }

    pub fn fetch_sizes(&self) -> Vec<usize> {
        self.fetch_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueTransport for MemoryQueue {
    async fn fetch(&self, request: FetchRequest) -> Result<Vec<Envelope>, TransportError> {
        self.fetch_sizes.lock().unwrap().push(request.max_messages);
        if self.fail_fetch {
            return Err(TransportError::Queue {
                message: "ReceiveMessage failed".to_string(),
            });
        }

        let mut pending = self.pending.lock().unwrap();
        let n = request.max_messages.min(pending.len());
        Ok(pending.drain(..n).collect())
    }

    async fn ack(&self, envelope: &Envelope) -> Result<(), TransportError> {
        if self.fail_ack {
            return Err(TransportError::Queue {
                message: "DeleteMessage failed".to_string(),
            });
        }
        self.acked.lock().unwrap().push(envelope.handle.clone());
        Ok(())
    }
}

/// Records payloads; fails on JSON payloads carrying `"fail": true`.
#[derive(Debug, Default)]
pub struct RecordingProcessor {
    pub payloads: Mutex<Vec<InnerPayload>>,
}

impl RecordingProcessor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn payloads(&self) -> Vec<InnerPayload> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageProcessor for RecordingProcessor {
    async fn process(&self, payload: InnerPayload) -> Result<(), ProcessorError> {
        let fail = payload
            .as_json()
            .and_then(|v| v.get("fail"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        self.payloads.lock().unwrap().push(payload);
        if fail {
            return Err(ProcessorError::new("event rejected by business rules"));
        }
        Ok(())
    }
}
