//! Queue abstraction for the gather loop.

mod arn;
mod directory;

pub use arn::QueueArn;
pub use directory::DirectoryQueue;

use async_trait::async_trait;

use crate::error::TransportError;

/// Most messages a single fetch may request (SQS `ReceiveMessage` limit).
pub const MAX_FETCH_PER_CALL: usize = 10;

/// Raw queue unit. `handle` is opaque and only used for acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub body: String,
    pub handle: String,
}

/// Parameters of one fetch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    /// At most [`MAX_FETCH_PER_CALL`].
    pub max_messages: usize,
    pub wait_time_seconds: u64,
    pub visibility_timeout_seconds: u64,
}

/// Message queue used by the gatherer.
///
/// Fetched messages stay on the queue until acknowledged; un-acked messages
/// are redelivered by the queue after the visibility timeout.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Receive up to `request.max_messages` messages. An empty result means
    /// the queue is drained.
    async fn fetch(&self, request: FetchRequest) -> Result<Vec<Envelope>, TransportError>;

    /// Delete a processed message.
    async fn ack(&self, envelope: &Envelope) -> Result<(), TransportError>;
}
