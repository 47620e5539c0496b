//! Subscription confirmation.

use std::sync::Arc;

use tracing::info;

use crate::error::TransportError;
use crate::http::{require_https, CertificateTransport};
use crate::types::SubscriptionRequest;

/// Confirms SNS subscriptions by visiting their `SubscribeURL`.
#[derive(Debug, Clone)]
pub struct SubscriptionConfirmer {
    transport: Arc<dyn CertificateTransport>,
}

impl SubscriptionConfirmer {
    /// Uses the same validated transport as certificate retrieval.
    pub fn new(transport: Arc<dyn CertificateTransport>) -> Self {
        Self { transport }
    }

    /// GET the `SubscribeURL`. Anything but 200 is an error.
    pub async fn confirm(&self, request: &SubscriptionRequest) -> Result<(), TransportError> {
        require_https(&request.subscribe_url)?;

        let response = self.transport.get(&request.subscribe_url).await?;
        if response.status != 200 {
            return Err(TransportError::Status {
                url: request.subscribe_url.clone(),
                status: response.status,
            });
        }

        info!(
            event = "subscription_confirmed",
            topic_arn = %request.topic_arn,
            message_id = %request.message_id
        );
        Ok(())
    }
}
