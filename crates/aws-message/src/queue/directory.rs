//! Queue backed by a directory of message files.
//!
//! Every file whose name starts with `message` is one message, served in name
//! order. A fetched message is leased for the visibility timeout; an acked
//! message is remembered by the SHA-256 of its body and never served again,
//! even if another file carries the same body.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{Envelope, FetchRequest, QueueTransport};
use crate::error::TransportError;

const MESSAGE_PREFIX: &str = "message";

#[derive(Debug, Default)]
struct State {
    acked: HashSet<String>,
    leases: HashMap<String, Instant>,
}

/// Local [`QueueTransport`] over `message*` files.
#[derive(Debug)]
pub struct DirectoryQueue {
    dir: PathBuf,
    state: Mutex<State>,
}

impl DirectoryQueue {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of distinct bodies acknowledged so far.
    pub fn acked_count(&self) -> usize {
        self.lock().acked.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Lease `hash` unless it is acked or already leased. Expired leases are
    /// dropped on the way.
    fn try_lease(&self, hash: &str, visibility: Duration) -> bool {
        let now = Instant::now();
        let mut state = self.lock();
        state.leases.retain(|_, until| *until > now);
        if state.acked.contains(hash) {
            return false;
        }
        if state.leases.get(hash).is_some_and(|until| *until > now) {
            return false;
        }
        state.leases.insert(hash.to_string(), now + visibility);
        true
    }

    async fn message_files(&self) -> Result<Vec<PathBuf>, TransportError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| queue_error(&self.dir, e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| queue_error(&self.dir, e))?
        {
            let is_message = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(MESSAGE_PREFIX));
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_message && is_file {
                files.push(entry.path());
            }
        }

        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl QueueTransport for DirectoryQueue {
    async fn fetch(&self, request: FetchRequest) -> Result<Vec<Envelope>, TransportError> {
        let visibility = Duration::from_secs(request.visibility_timeout_seconds);
        let mut batch = Vec::new();

        for path in self.message_files().await? {
            if batch.len() >= request.max_messages {
                break;
            }

            let body = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| queue_error(&path, e))?;
            let hash = body_hash(&body);
            if !self.try_lease(&hash, visibility) {
                continue;
            }

            debug!(file = %path.display(), "leased message file");
            batch.push(Envelope { body, handle: hash });
        }

        Ok(batch)
    }

    async fn ack(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.leases.remove(&envelope.handle);
        state.acked.insert(envelope.handle.clone());
        Ok(())
    }
}

fn body_hash(body: &str) -> String {
    hex::encode(Sha256::digest(body.as_bytes()))
}

fn queue_error(path: &Path, err: std::io::Error) -> TransportError {
    TransportError::Queue {
        message: format!("{}: {}", path.display(), err),
    }
}
