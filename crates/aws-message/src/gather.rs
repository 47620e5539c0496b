//! Gather loop: poll, authenticate, dispatch, acknowledge.
//!
//! One cycle fetches up to `poll_batch_budget` messages and handles them in
//! order. A message is acknowledged only once it has been fully handled;
//! anything that fails stays on the queue and is redelivered after the
//! visibility timeout. Queue errors abort the cycle.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::cert_cache::CertificateCache;
use crate::config::{GatherConfig, SignatureFailurePolicy};
use crate::decode::{message_id_of, EnvelopeDecoder};
use crate::error::{ConfigError, DecodeError, GatherResult, TransportError};
use crate::http::{transport_for, CertificateTransport};
use crate::processor::MessageProcessor;
use crate::queue::{Envelope, FetchRequest, QueueTransport, MAX_FETCH_PER_CALL};
use crate::subscribe::SubscriptionConfirmer;
use crate::types::{Disposition, SubscriptionRequest};

/// Counts from one gather cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GatherReport {
    /// Messages received from the queue.
    pub fetched: usize,
    /// Payloads accepted by the processor.
    pub processed: usize,
    /// Subscription confirmations seen (and confirmed, when enabled).
    pub subscriptions: Vec<SubscriptionRequest>,
    /// Topic mismatches and unsubscribe confirmations.
    pub soft_rejected: usize,
    /// Failures left on the queue.
    pub retained: usize,
    /// Signature failures acknowledged under [`SignatureFailurePolicy::Discard`].
    pub discarded: usize,
}

impl GatherReport {
    /// Messages deleted from the queue.
    pub fn acked(&self) -> usize {
        self.processed + self.subscriptions.len() + self.soft_rejected + self.discarded
    }
}

enum Outcome {
    Processed,
    Subscription(SubscriptionRequest),
    SoftRejected,
    Discarded,
    Retained,
}

/// Drives gather cycles for one queue.
pub struct Gatherer {
    queue: Arc<dyn QueueTransport>,
    processor: Arc<dyn MessageProcessor>,
    decoder: EnvelopeDecoder,
    confirmer: Option<SubscriptionConfirmer>,
    budget: usize,
    wait_time_seconds: u64,
    visibility_timeout_seconds: u64,
    policy: SignatureFailurePolicy,
}

impl std::fmt::Debug for Gatherer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gatherer")
            .field("budget", &self.budget)
            .field("policy", &self.policy)
            .field("confirm_subscriptions", &self.confirmer.is_some())
            .finish_non_exhaustive()
    }
}

impl Gatherer {
    /// Build a gatherer over an explicit certificate transport.
    pub fn new(
        config: &GatherConfig,
        queue: Arc<dyn QueueTransport>,
        transport: Arc<dyn CertificateTransport>,
        processor: Arc<dyn MessageProcessor>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let certificates = CertificateCache::with_ttl(
            Arc::clone(&transport),
            Duration::from_secs(config.certificate_ttl_secs),
        );
        let decoder = EnvelopeDecoder::new(config, certificates)?;
        let confirmer = config
            .confirm_subscriptions
            .then(|| SubscriptionConfirmer::new(transport));

        Ok(Self {
            queue,
            processor,
            decoder,
            confirmer,
            budget: config.poll_batch_budget,
            wait_time_seconds: config.wait_time_seconds,
            visibility_timeout_seconds: config.visibility_timeout_seconds,
            policy: config.signature_failure_policy,
        })
    }

    /// Build a gatherer whose transport is chosen by
    /// [`transport_for`]: HTTPS anchored on `trust_bundle_path`, or offline
    /// when nothing needs fetching.
    pub fn from_config(
        config: &GatherConfig,
        queue: Arc<dyn QueueTransport>,
        processor: Arc<dyn MessageProcessor>,
    ) -> Result<Self, ConfigError> {
        Self::new(config, queue, transport_for(config)?, processor)
    }

    pub fn decoder(&self) -> &EnvelopeDecoder {
        &self.decoder
    }

    /// Run one gather cycle.
    pub async fn gather_events(&self) -> GatherResult<GatherReport> {
        let batch = self.fetch_batch().await?;
        let mut report = GatherReport {
            fetched: batch.len(),
            ..GatherReport::default()
        };
        debug!(messages = batch.len(), "gathered batch");

        for envelope in &batch {
            match self.dispatch(envelope).await {
                Outcome::Retained => {
                    report.retained += 1;
                    continue;
                }
                Outcome::Processed => report.processed += 1,
                Outcome::Subscription(request) => report.subscriptions.push(request),
                Outcome::SoftRejected => report.soft_rejected += 1,
                Outcome::Discarded => report.discarded += 1,
            }
            self.queue.ack(envelope).await?;
        }

        info!(
            event = "gather_cycle",
            fetched = report.fetched,
            processed = report.processed,
            subscriptions = report.subscriptions.len(),
            soft_rejected = report.soft_rejected,
            retained = report.retained,
            discarded = report.discarded,
        );
        Ok(report)
    }

    /// Fetch up to the budget, [`MAX_FETCH_PER_CALL`] at a time, stopping
    /// when the queue runs dry. A handle redelivered within the same cycle
    /// is kept once.
    async fn fetch_batch(&self) -> Result<Vec<Envelope>, TransportError> {
        let mut batch = Vec::new();
        let mut seen = HashSet::new();
        let mut remaining = self.budget;

        while remaining > 0 {
            let wanted = remaining.min(MAX_FETCH_PER_CALL);
            let messages = self
                .queue
                .fetch(FetchRequest {
                    max_messages: wanted,
                    wait_time_seconds: self.wait_time_seconds,
                    visibility_timeout_seconds: self.visibility_timeout_seconds,
                })
                .await?;

            let received = messages.len();
            for envelope in messages {
                if seen.insert(envelope.handle.clone()) {
                    batch.push(envelope);
                } else {
                    debug!(handle = %envelope.handle, "redelivered within cycle, skipped");
                }
            }
            remaining = remaining.saturating_sub(received);

            if received < wanted {
                break;
            }
        }

        Ok(batch)
    }

    async fn dispatch(&self, envelope: &Envelope) -> Outcome {
        let value: Value = match serde_json::from_str(&envelope.body) {
            Ok(value) => value,
            Err(e) => {
                error!(handle = %envelope.handle, error = %e, "message body is not JSON");
                return Outcome::Retained;
            }
        };
        let message_id = message_id_of(&value).unwrap_or("<unknown>").to_string();

        let disposition = match self.decoder.classify(value).await {
            Ok(disposition) => disposition,
            Err(e) => return self.rejected(&message_id, &e),
        };

        match disposition {
            Disposition::Deliver(payload) => match self.processor.process(payload).await {
                Ok(()) => {
                    debug!(message_id = %message_id, "processed");
                    Outcome::Processed
                }
                Err(e) => {
                    error!(message_id = %message_id, error = %error_chain(&e), "processor failed");
                    Outcome::Retained
                }
            },
            Disposition::Subscription(request) => {
                if let Some(confirmer) = &self.confirmer {
                    if let Err(e) = confirmer.confirm(&request).await {
                        error!(
                            message_id = %message_id,
                            topic_arn = %request.topic_arn,
                            error = %e,
                            "subscription confirmation failed"
                        );
                        return Outcome::Retained;
                    }
                }
                info!(
                    event = "subscription_request",
                    message_id = %message_id,
                    topic_arn = %request.topic_arn
                );
                Outcome::Subscription(request)
            }
            Disposition::Unsubscribed { topic_arn } => {
                info!(message_id = %message_id, topic_arn = %topic_arn, "unsubscribe confirmation");
                Outcome::SoftRejected
            }
            Disposition::TopicMismatch { .. } => Outcome::SoftRejected,
        }
    }

    fn rejected(&self, message_id: &str, err: &DecodeError) -> Outcome {
        if err.is_signature_failure() && self.policy == SignatureFailurePolicy::Discard {
            warn!(message_id = %message_id, error = %error_chain(err), "discarding unauthenticated message");
            return Outcome::Discarded;
        }

        error!(message_id = %message_id, error = %error_chain(err), "cannot decode message");
        Outcome::Retained
    }
}

/// `err: source: source ...`
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
