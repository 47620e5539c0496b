//! Caller-supplied business logic.

use async_trait::async_trait;

use crate::error::ProcessorError;
use crate::types::InnerPayload;

/// Handles one decoded payload.
///
/// Returning `Ok` lets the gatherer acknowledge the message; an error leaves
/// it on the queue for redelivery, so implementations should be idempotent.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    async fn process(&self, payload: InnerPayload) -> Result<(), ProcessorError>;
}
