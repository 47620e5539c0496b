//! Consumer configuration.
//!
//! Passed explicitly to every component at construction. Loadable from YAML
//! and overridable from the environment:
//!
//! | Environment Variable | Field |
//! |---------------------|-------|
//! | `AWS_MESSAGE_QUEUE` | `queue` |
//! | `AWS_MESSAGE_POLL_BATCH_BUDGET` | `poll_batch_budget` |
//! | `AWS_MESSAGE_WAIT_TIME` | `wait_time_seconds` |
//! | `AWS_MESSAGE_VISIBILITY_TIMEOUT` | `visibility_timeout_seconds` |
//! | `AWS_MESSAGE_VALIDATE_SIGNATURE` | `validate_signature` |
//! | `AWS_MESSAGE_EXPECTED_TOPIC_ARN` | `expected_topic_arn` |
//! | `AWS_MESSAGE_TRUST_BUNDLE` | `trust_bundle_path` |
//! | `AWS_MESSAGE_CERTIFICATE_TTL` | `certificate_ttl_secs` |
//! | `AWS_MESSAGE_SIGNATURE_FAILURE_POLICY` | `signature_failure_policy` |
//! | `AWS_MESSAGE_CONFIRM_SUBSCRIPTIONS` | `confirm_subscriptions` |

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::cert_cache::DEFAULT_CERTIFICATE_TTL_SECS;
use crate::cipher::BLOCK_SIZE;
use crate::error::ConfigError;
use crate::queue::QueueArn;

/// What to do with an envelope that fails authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureFailurePolicy {
    /// Leave it on the queue; it is redelivered after the visibility timeout.
    #[default]
    Retain,
    /// Acknowledge (delete) it after logging.
    Discard,
}

impl std::str::FromStr for SignatureFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "retain" => Ok(Self::Retain),
            "discard" => Ok(Self::Discard),
            other => Err(ConfigError::invalid(
                "signature_failure_policy",
                format!("expected retain or discard, got {}", other),
            )),
        }
    }
}

/// Gather loop and decoder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatherConfig {
    /// Queue identifier (SQS ARN or transport-specific name).
    #[serde(default)]
    pub queue: Option<String>,

    /// Messages requested per gather cycle.
    #[serde(default = "default_poll_batch_budget")]
    pub poll_batch_budget: usize,

    /// Long-poll wait per fetch call.
    #[serde(default = "default_wait_time")]
    pub wait_time_seconds: u64,

    /// Visibility timeout applied to fetched messages.
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_seconds: u64,

    /// Authenticate envelopes before decoding.
    #[serde(default = "default_true")]
    pub validate_signature: bool,

    /// Only envelopes from this topic are processed.
    #[serde(default)]
    pub expected_topic_arn: Option<String>,

    /// keyId -> base64 AES-128 key.
    #[serde(default)]
    pub encryption_keys: BTreeMap<String, String>,

    /// PEM CA bundle anchoring certificate fetches.
    #[serde(default)]
    pub trust_bundle_path: Option<PathBuf>,

    /// Lifetime of cached signing certificates.
    #[serde(default = "default_certificate_ttl")]
    pub certificate_ttl_secs: u64,

    #[serde(default)]
    pub signature_failure_policy: SignatureFailurePolicy,

    /// GET the SubscribeURL of subscription confirmations.
    #[serde(default)]
    pub confirm_subscriptions: bool,
}

fn default_poll_batch_budget() -> usize {
    10
}

fn default_wait_time() -> u64 {
    10
}

fn default_visibility_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_certificate_ttl() -> u64 {
    DEFAULT_CERTIFICATE_TTL_SECS
}

impl Default for GatherConfig {
    fn default() -> Self {
        Self {
            queue: None,
            poll_batch_budget: default_poll_batch_budget(),
            wait_time_seconds: default_wait_time(),
            visibility_timeout_seconds: default_visibility_timeout(),
            validate_signature: true,
            expected_topic_arn: None,
            encryption_keys: BTreeMap::new(),
            trust_bundle_path: None,
            certificate_ttl_secs: default_certificate_ttl(),
            signature_failure_policy: SignatureFailurePolicy::default(),
            confirm_subscriptions: false,
        }
    }
}

impl GatherConfig {
    /// Parse YAML configuration.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Load {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Load YAML configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_yaml::from_str(&text).map_err(|e| ConfigError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Defaults overridden from process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides(|name| std::env::var(name).ok())
    }

    /// Apply `AWS_MESSAGE_*` overrides resolved through `lookup`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("AWS_MESSAGE_QUEUE") {
            self.queue = Some(v);
        }
        if let Some(v) = lookup("AWS_MESSAGE_POLL_BATCH_BUDGET") {
            self.poll_batch_budget = parse_number("poll_batch_budget", &v)?;
        }
        if let Some(v) = lookup("AWS_MESSAGE_WAIT_TIME") {
            self.wait_time_seconds = parse_number("wait_time_seconds", &v)?;
        }
        if let Some(v) = lookup("AWS_MESSAGE_VISIBILITY_TIMEOUT") {
            self.visibility_timeout_seconds = parse_number("visibility_timeout_seconds", &v)?;
        }
        if let Some(v) = lookup("AWS_MESSAGE_VALIDATE_SIGNATURE") {
            self.validate_signature = parse_flag(&v);
        }
        if let Some(v) = lookup("AWS_MESSAGE_EXPECTED_TOPIC_ARN") {
            self.expected_topic_arn = Some(v);
        }
        if let Some(v) = lookup("AWS_MESSAGE_TRUST_BUNDLE") {
            self.trust_bundle_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("AWS_MESSAGE_CERTIFICATE_TTL") {
            self.certificate_ttl_secs = parse_number("certificate_ttl_secs", &v)?;
        }
        if let Some(v) = lookup("AWS_MESSAGE_SIGNATURE_FAILURE_POLICY") {
            self.signature_failure_policy = v.parse()?;
        }
        if let Some(v) = lookup("AWS_MESSAGE_CONFIRM_SUBSCRIPTIONS") {
            self.confirm_subscriptions = parse_flag(&v);
        }
        Ok(self)
    }

    /// Set the queue identifier.
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Set the per-cycle message budget.
    pub fn with_poll_batch_budget(mut self, budget: usize) -> Self {
        self.poll_batch_budget = budget;
        self
    }

    /// Enable or disable envelope authentication.
    pub fn with_validate_signature(mut self, validate: bool) -> Self {
        self.validate_signature = validate;
        self
    }

    /// Restrict processing to one topic.
    pub fn with_expected_topic_arn(mut self, topic_arn: impl Into<String>) -> Self {
        self.expected_topic_arn = Some(topic_arn.into());
        self
    }

    /// Register a base64 AES-128 key under `key_id`.
    pub fn with_encryption_key(
        mut self,
        key_id: impl Into<String>,
        key_b64: impl Into<String>,
    ) -> Self {
        self.encryption_keys.insert(key_id.into(), key_b64.into());
        self
    }

    /// Set the CA bundle used for certificate fetches.
    pub fn with_trust_bundle_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.trust_bundle_path = Some(path.into());
        self
    }

    pub fn with_signature_failure_policy(mut self, policy: SignatureFailurePolicy) -> Self {
        self.signature_failure_policy = policy;
        self
    }

    pub fn with_confirm_subscriptions(mut self, confirm: bool) -> Self {
        self.confirm_subscriptions = confirm;
        self
    }

    /// Check settings that do not need I/O.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let queue = self
            .queue
            .as_deref()
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ConfigError::missing("queue"))?;
        if queue.starts_with("arn:") {
            QueueArn::parse(queue)?;
        }

        if self.poll_batch_budget == 0 {
            return Err(ConfigError::invalid(
                "poll_batch_budget",
                "must be at least 1",
            ));
        }

        self.decoded_keys()?;
        Ok(())
    }

    /// Parsed queue ARN, when `queue` is one.
    pub fn queue_arn(&self) -> Result<Option<QueueArn>, ConfigError> {
        match self.queue.as_deref() {
            Some(q) if q.starts_with("arn:") => QueueArn::parse(q).map(Some),
            _ => Ok(None),
        }
    }

    /// Decode the key table. Every key must be 16 bytes.
    pub fn decoded_keys(&self) -> Result<HashMap<String, Vec<u8>>, ConfigError> {
        self.encryption_keys
            .iter()
            .map(|(key_id, key_b64)| {
                let key = BASE64.decode(key_b64.trim()).map_err(|e| {
                    ConfigError::invalid(
                        format!("encryption_keys.{}", key_id),
                        format!("invalid base64: {}", e),
                    )
                })?;
                if key.len() != BLOCK_SIZE {
                    return Err(ConfigError::invalid(
                        format!("encryption_keys.{}", key_id),
                        format!("expected {} bytes, got {}", BLOCK_SIZE, key.len()),
                    ));
                }
                Ok((key_id.clone(), key))
            })
            .collect()
    }
}

fn parse_number<T: std::str::FromStr>(setting: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(setting, format!("{}: {}", value, e)))
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
