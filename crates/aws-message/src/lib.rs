//! Authenticated consumer for SNS notifications delivered through SQS.
//!
//! This crate provides:
//!
//! - Canonical signing strings and RSA/SHA-1 signature verification
//! - A read-through cache of signing certificates fetched over validated TLS
//! - AES-128-CBC decryption of encrypted payloads
//! - Envelope classification (notifications, subscription and unsubscribe
//!   confirmations, topic filtering)
//! - A gather loop that acknowledges a message only after it was handled
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use aws_message::{
//!     DirectoryQueue, GatherConfig, Gatherer, InnerPayload, MessageProcessor, ProcessorError,
//! };
//!
//! struct PrintEvents;
//!
//! #[async_trait]
//! impl MessageProcessor for PrintEvents {
//!     async fn process(&self, payload: InnerPayload) -> Result<(), ProcessorError> {
//!         println!("{}", payload.to_json());
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatherConfig::from_env()?.with_queue("arn:aws:sqs:us-west-2:000000000000:events");
//! let queue = Arc::new(DirectoryQueue::new("./mock-queue"));
//! let gatherer = Gatherer::from_config(&config, queue, Arc::new(PrintEvents))?;
//!
//! let report = gatherer.gather_events().await?;
//! println!("processed {} of {}", report.processed, report.fetched);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `AWS_MESSAGE_QUEUE` | Queue ARN or local queue name |
//! | `AWS_MESSAGE_POLL_BATCH_BUDGET` | Messages per gather cycle (default: 10) |
//! | `AWS_MESSAGE_WAIT_TIME` | Long-poll wait in seconds (default: 10) |
//! | `AWS_MESSAGE_VISIBILITY_TIMEOUT` | Visibility timeout in seconds (default: 10) |
//! | `AWS_MESSAGE_VALIDATE_SIGNATURE` | Verify envelope signatures (default: true) |
//! | `AWS_MESSAGE_EXPECTED_TOPIC_ARN` | Only process envelopes from this topic |
//! | `AWS_MESSAGE_TRUST_BUNDLE` | PEM CA bundle for certificate fetches |
//! | `AWS_MESSAGE_CERTIFICATE_TTL` | Certificate cache TTL in seconds (default: 604800) |
//! | `AWS_MESSAGE_SIGNATURE_FAILURE_POLICY` | `retain` or `discard` (default: `retain`) |
//! | `AWS_MESSAGE_CONFIRM_SUBSCRIPTIONS` | Visit `SubscribeURL` of confirmations (default: false) |

pub mod canonical;
pub mod cert_cache;
pub mod cipher;
pub mod config;
pub mod decode;
pub mod error;
pub mod extract;
pub mod gather;
pub mod http;
pub mod processor;
pub mod queue;
pub mod subscribe;
pub mod types;
pub mod verify;

// Re-export main types
pub use canonical::{signing_string, MissingField};
pub use cert_cache::{CertificateCache, DEFAULT_CERTIFICATE_TTL_SECS};
pub use cipher::Aes128Cbc;
pub use config::{GatherConfig, SignatureFailurePolicy};
pub use decode::{message_id_of, EnvelopeDecoder};
pub use error::{
    CertificateFetchError, CipherError, ConfigError, DecodeError, DecodeResult, GatherError,
    GatherResult, ProcessorError, TransportError, VerificationError,
};
pub use extract::{EventHeader, HeaderedMessage};
pub use gather::{GatherReport, Gatherer};
pub use http::{
    transport_for, CertificateTransport, HttpResponse, HttpsCertificateFetcher, OfflineTransport,
};
pub use processor::MessageProcessor;
pub use queue::{DirectoryQueue, Envelope, FetchRequest, QueueArn, QueueTransport, MAX_FETCH_PER_CALL};
pub use subscribe::SubscriptionConfirmer;
pub use types::{
    Disposition, InnerPayload, MessageType, NotificationHeader, SubscriptionRequest,
    SIGNATURE_VERSION_1,
};
pub use verify::{verify_signature, VerificationContext};
