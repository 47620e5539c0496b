//! Read-through cache of signing certificates.
//!
//! Entries are keyed by the SHA-256 of the certificate URL, not of the
//! certificate bytes. A URL that starts serving different content keeps
//! returning the cached certificate until the entry expires or is
//! invalidated, so certificate rotation is expected to use a fresh URL.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::CertificateFetchError;
use crate::http::CertificateTransport;

/// Default certificate TTL (one week).
pub const DEFAULT_CERTIFICATE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Upper bound on cached certificates.
const MAX_CACHED_CERTIFICATES: u64 = 256;

/// Certificate cache with fetch-on-miss.
///
/// Cloning shares the underlying cache. Concurrent misses for the same URL
/// may each fetch; the last writer wins, which is harmless because fetches
/// are idempotent.
#[derive(Debug, Clone)]
pub struct CertificateCache {
    cache: Cache<String, Arc<Vec<u8>>>,
    transport: Arc<dyn CertificateTransport>,
}

impl CertificateCache {
    pub fn new(transport: Arc<dyn CertificateTransport>) -> Self {
        Self::with_ttl(transport, Duration::from_secs(DEFAULT_CERTIFICATE_TTL_SECS))
    }

    pub fn with_ttl(transport: Arc<dyn CertificateTransport>, ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(MAX_CACHED_CERTIFICATES)
                .time_to_live(ttl)
                .build(),
            transport,
        }
    }

    /// Certificate bytes for `url`, fetched on miss.
    pub async fn get(&self, url: &str) -> Result<Arc<Vec<u8>>, CertificateFetchError> {
        let key = cache_key(url);

        if let Some(pem) = self.cache.get(&key) {
            debug!(key = %key, "certificate cache hit");
            return Ok(pem);
        }

        info!(event = "certificate_fetch", url = %url);
        let response = self
            .transport
            .get(url)
            .await
            .map_err(|e| CertificateFetchError {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if response.status != 200 {
            return Err(CertificateFetchError {
                url: url.to_string(),
                reason: format!("status {}", response.status),
            });
        }

        let pem = Arc::new(response.body);
        self.cache.insert(key, Arc::clone(&pem));
        Ok(pem)
    }

    /// Whether `url` currently has a live entry.
    pub fn contains(&self, url: &str) -> bool {
        self.cache.contains_key(&cache_key(url))
    }

    /// Drop the entry for `url`, forcing the next `get` to fetch.
    pub fn invalidate(&self, url: &str) {
        self.cache.invalidate(&cache_key(url));
    }

    /// Approximate number of cached certificates.
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hex SHA-256 of the URL.
pub(crate) fn cache_key(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}
