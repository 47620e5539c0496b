//! HTTPS transport for certificate retrieval and subscription confirmation.
//!
//! Trust comes only from the configured CA bundle: built-in roots are
//! disabled, plaintext URLs are refused before any network access and
//! redirects are not followed.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;
use url::Url;

use crate::config::GatherConfig;
use crate::error::{ConfigError, TransportError};

const USER_AGENT_VALUE: &str = concat!("aws-message/", env!("CARGO_PKG_VERSION"));

/// Certificates and confirmation responses are small; anything larger is refused.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default overall request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Status and body of a GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// GET over a validated TLS channel.
#[async_trait]
pub trait CertificateTransport: Send + Sync + std::fmt::Debug {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

/// reqwest/rustls implementation of [`CertificateTransport`].
#[derive(Debug, Clone)]
pub struct HttpsCertificateFetcher {
    client: reqwest::Client,
}

impl HttpsCertificateFetcher {
    /// Build a fetcher anchored on the PEM bundle at `trust_bundle_path`.
    ///
    /// The bundle is mandatory: a missing path, unreadable file or bundle
    /// without certificates fails here, never at fetch time.
    pub fn new(trust_bundle_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::with_timeouts(
            trust_bundle_path,
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_timeouts(
        trust_bundle_path: Option<&Path>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let path = trust_bundle_path.ok_or_else(|| ConfigError::missing("trust_bundle_path"))?;

        let pem = std::fs::read(path).map_err(|e| ConfigError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let roots = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
            ConfigError::invalid("trust_bundle_path", format!("unreadable CA bundle: {}", e))
        })?;
        if roots.is_empty() {
            return Err(ConfigError::invalid(
                "trust_bundle_path",
                format!("no certificates in {}", path.display()),
            ));
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let mut builder = reqwest::Client::builder()
            .default_headers(default_headers)
            .tls_built_in_root_certs(false)
            .https_only(true)
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(connect_timeout)
            .timeout(request_timeout);
        for root in roots {
            builder = builder.add_root_certificate(root);
        }

        let client = builder.build().map_err(|e| {
            ConfigError::invalid("trust_bundle_path", format!("failed to create HTTP client: {}", e))
        })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl CertificateTransport for HttpsCertificateFetcher {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let parsed = require_https(url)?;
        debug!(url = %url, "GET over validated TLS");

        let response = self.client.get(parsed).send().await?;
        let status = response.status().as_u16();

        if let Some(len) = response.content_length() {
            if len > MAX_BODY_BYTES as u64 {
                return Err(TransportError::Network {
                    message: format!("response from {} too large: {} bytes", url, len),
                });
            }
        }

        let body = response.bytes().await.map_err(|e| TransportError::Network {
            message: format!("failed to read response body: {}", e),
        })?;
        if body.len() > MAX_BODY_BYTES {
            return Err(TransportError::Network {
                message: format!("response from {} too large: {} bytes", url, body.len()),
            });
        }

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Transport for configurations that never touch the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTransport;

#[async_trait]
impl CertificateTransport for OfflineTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        Err(TransportError::RefusedUrl {
            url: url.to_string(),
            reason: "network access disabled".to_string(),
        })
    }
}

/// Transport matching `config`: [`HttpsCertificateFetcher`] when signatures
/// are validated or subscriptions confirmed, [`OfflineTransport`] otherwise.
///
/// The trust bundle is only required when something will be fetched.
pub fn transport_for(config: &GatherConfig) -> Result<Arc<dyn CertificateTransport>, ConfigError> {
    if config.validate_signature || config.confirm_subscriptions {
        Ok(Arc::new(HttpsCertificateFetcher::new(
            config.trust_bundle_path.as_deref(),
        )?))
    } else {
        Ok(Arc::new(OfflineTransport))
    }
}

/// Parse `url` and refuse anything but `https`.
pub(crate) fn require_https(url: &str) -> Result<Url, TransportError> {
    let parsed = Url::parse(url).map_err(|e| TransportError::RefusedUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if parsed.scheme() != "https" {
        return Err(TransportError::RefusedUrl {
            url: url.to_string(),
            reason: format!("scheme {} is not https", parsed.scheme()),
        });
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn bundle_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_trust_bundle_is_mandatory() {
        let err = HttpsCertificateFetcher::new(None).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { ref setting } if setting == "trust_bundle_path"));
    }

    #[test]
    fn test_unreadable_trust_bundle() {
        let err = HttpsCertificateFetcher::new(Some(Path::new("/nonexistent/ca-bundle.pem")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Load { .. }));
    }

    #[test]
    fn test_empty_trust_bundle() {
        let file = bundle_file("");
        let err = HttpsCertificateFetcher::new(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_valid_trust_bundle() {
        let certified =
            rcgen::generate_simple_self_signed(vec!["sns.example.com".to_string()]).unwrap();
        let file = bundle_file(&certified.cert.pem());
        assert!(HttpsCertificateFetcher::new(Some(file.path())).is_ok());
    }

    #[test]
    fn test_transport_for() {
        let offline = GatherConfig::default().with_validate_signature(false);
        assert!(transport_for(&offline).is_ok());

        let err = transport_for(&GatherConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));

        let err = transport_for(&offline.with_confirm_subscriptions(true)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));
    }

    #[tokio::test]
    async fn test_offline_transport_refuses() {
        let err = OfflineTransport
            .get("https://sns.us-west-2.amazonaws.com/cert.pem")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::RefusedUrl { .. }));
    }

    #[test]
    fn test_require_https() {
        assert!(require_https("https://sns.us-west-2.amazonaws.com/cert.pem").is_ok());

        let err = require_https("http://sns.us-west-2.amazonaws.com/cert.pem").unwrap_err();
        assert!(matches!(err, TransportError::RefusedUrl { .. }));
        assert!(err.to_string().contains("not https"));

        assert!(require_https("not a url").is_err());
    }
}
