//! Pending correlation table.
//!
//! Maps each in-flight request to the caller waiting for it. Every entry is
//! removed exactly once: by resolution, by its own caller giving up (timeout,
//! send failure), or by cancellation when its connection goes away. Removal
//! hands back the waiter so the caller can complete it outside any lock.

use std::collections::HashMap;

use consultoria_proto::{RequestId, Response};
use tokio::sync::oneshot;

use crate::error::SessionError;

/// Outcome delivered to a waiting caller.
pub type Outcome = Result<Response, SessionError>;

/// Completion side of a pending entry.
#[derive(Debug)]
pub struct Waiter {
    tx: oneshot::Sender<Outcome>,
}

impl Waiter {
    /// Deliver the outcome. A caller that already gave up is ignored.
    pub fn complete(self, outcome: Outcome) {
        let _ = self.tx.send(outcome);
    }
}

#[derive(Debug)]
struct Entry {
    generation: u64,
    waiter: Waiter,
}

/// In-flight requests keyed by correlation key.
///
/// Entries are tagged with the connection generation they were sent on, so a
/// dying connection only cancels its own requests.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: HashMap<RequestId, Entry>,
}

impl PendingTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request sent on connection `generation`.
    ///
    /// Returns the receiver the caller awaits, or `None` if the key is already
    /// in flight.
    pub fn register(
        &mut self,
        request_id: RequestId,
        generation: u64,
    ) -> Option<oneshot::Receiver<Outcome>> {
        if self.entries.contains_key(&request_id) {
            return None;
        }

        let (tx, rx) = oneshot::channel();
        self.entries.insert(request_id, Entry { generation, waiter: Waiter { tx } });
        Some(rx)
    }

    /// Remove the entry for a response's correlation key.
    ///
    /// `None` means the response is stale or a duplicate.
    pub fn resolve(&mut self, request_id: &RequestId) -> Option<Waiter> {
        self.entries.remove(request_id).map(|entry| entry.waiter)
    }

    /// Remove an entry whose caller stopped waiting.
    pub fn remove(&mut self, request_id: &RequestId) -> bool {
        self.entries.remove(request_id).is_some()
    }

    /// Remove every entry sent on `generation`.
    pub fn cancel_generation(&mut self, generation: u64) -> Vec<Waiter> {
        let doomed: Vec<RequestId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.generation == generation)
            .map(|(id, _)| id.clone())
            .collect();

        doomed.iter().filter_map(|id| self.entries.remove(id)).map(|entry| entry.waiter).collect()
    }

    /// Remove every entry.
    pub fn cancel_all(&mut self) -> Vec<Waiter> {
        self.entries.drain().map(|(_, entry)| entry.waiter).collect()
    }

    /// Number of requests in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
