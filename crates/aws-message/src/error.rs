//! Error types for envelope authentication, decoding and gathering.

/// Configuration errors. Always raised at construction, never mid-cycle.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required setting is absent.
    #[error("missing required setting: {setting}")]
    Missing { setting: String },

    /// A setting is present but unusable.
    #[error("invalid setting {setting}: {reason}")]
    Invalid { setting: String, reason: String },

    /// A configuration file could not be read or parsed.
    #[error("cannot load configuration from {path}: {message}")]
    Load { path: String, message: String },
}

impl ConfigError {
    pub(crate) fn missing(setting: impl Into<String>) -> Self {
        Self::Missing {
            setting: setting.into(),
        }
    }

    pub(crate) fn invalid(setting: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            setting: setting.into(),
            reason: reason.into(),
        }
    }
}

/// Queue or network failure. Aborts the current gather cycle.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Network error talking to a remote endpoint.
    #[error("network error: {message}")]
    Network { message: String },

    /// Remote endpoint answered with an unexpected HTTP status.
    #[error("unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    /// URL refused before any network access (plaintext, unparsable).
    #[error("refused URL {url}: {reason}")]
    RefusedUrl { url: String, reason: String },

    /// Queue-side failure (receive or delete).
    #[error("queue error: {message}")]
    Queue { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Signing certificate could not be obtained.
#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot get certificate {url}: {reason}")]
pub struct CertificateFetchError {
    pub url: String,
    pub reason: String,
}

/// Envelope is not trustworthy.
///
/// Malformed certificates, non-RSA keys and digest mismatches all land here;
/// only `reason` tells them apart.
#[derive(Debug, Clone, thiserror::Error)]
#[error("signature verification failed for message {message_id} (SignatureVersion {signature_version}): {reason}")]
pub struct VerificationError {
    pub message_id: String,
    pub signature_version: String,
    pub reason: String,
}

/// Symmetric cipher failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CipherError {
    /// Key or IV absent.
    #[error("missing AES {material}")]
    MissingKeyMaterial { material: &'static str },

    /// Bad key length, corrupt ciphertext or unresolvable padding.
    #[error("cannot decrypt message: {reason}")]
    Failed { reason: String },
}

/// Per-envelope failure. Caught at the gather loop's message boundary.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Outer structure is not a recognizable envelope.
    #[error("malformed envelope: {reason}")]
    MalformedEnvelope { reason: String },

    /// Only SignatureVersion "1" is accepted.
    #[error("unknown SNS signature version: {version}")]
    UnsupportedSignatureVersion { version: String },

    #[error(transparent)]
    CertificateFetch(#[from] CertificateFetchError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Encrypted payload names a key that is not configured.
    #[error("invalid keyId: {key_id}")]
    InvalidKeyReference { key_id: String },

    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// Headered envelope with a content type other than JSON.
    #[error("unknown content-type: {content_type}")]
    UnsupportedContentType { content_type: String },

    /// Payload bytes could not be read (bad base64, invalid JSON where JSON is required).
    #[error("cannot read payload: {reason}")]
    Payload { reason: String },
}

impl DecodeError {
    /// Whether the failure happened while authenticating the envelope.
    ///
    /// These are governed by [`SignatureFailurePolicy`](crate::SignatureFailurePolicy).
    pub fn is_signature_failure(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedSignatureVersion { .. }
                | Self::CertificateFetch(_)
                | Self::Verification(_)
        )
    }

    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MalformedEnvelope { .. } | Self::Payload { .. } => 1,
            Self::UnsupportedContentType { .. } => 1,

            // Untrusted envelope
            Self::UnsupportedSignatureVersion { .. } => 4,
            Self::Verification(_) => 4,

            Self::CertificateFetch(_) => 5,

            Self::InvalidKeyReference { .. } => 6,
            Self::Cipher(_) => 6,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            reason: reason.into(),
        }
    }

    pub(crate) fn payload(reason: impl Into<String>) -> Self {
        Self::Payload {
            reason: reason.into(),
        }
    }
}

/// Business-logic failure surfaced by a [`MessageProcessor`](crate::MessageProcessor).
#[derive(Debug, thiserror::Error)]
#[error("processor failed: {message}")]
pub struct ProcessorError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProcessorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors that escape a gather cycle.
#[derive(Debug, thiserror::Error)]
pub enum GatherError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl GatherError {
    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Transport(_) => 5,
        }
    }

    /// Whether the outer caller may simply run another cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Result type for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for gather operations.
pub type GatherResult<T> = Result<T, GatherError>;
