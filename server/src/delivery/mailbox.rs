//! Pending messages for clients that have no live connection.
//!
//! Queues are created on the first undeliverable send and removed whole when
//! the recipient next connects. Unbounded unless a per-client capacity is
//! configured, in which case the oldest message is evicted to make room.

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;

use super::ClientId;

#[derive(Debug, Default)]
pub struct Mailbox {
    queues: HashMap<ClientId, VecDeque<String>>,
    capacity: Option<NonZeroUsize>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_limit(capacity: Option<NonZeroUsize>) -> Self {
        Self {
            queues: HashMap::new(),
            capacity,
        }
    }

    /// Append `message` to the queue for `id`.
    ///
    /// Returns the evicted message when the queue was already at capacity.
    pub fn enqueue(&mut self, id: ClientId, message: String) -> Option<String> {
        let queue = self.queues.entry(id).or_default();
        let evicted = match self.capacity {
            Some(limit) if queue.len() >= limit.get() => queue.pop_front(),
            _ => None,
        };
        queue.push_back(message);
        evicted
    }

    /// Remove and return every pending message for `id`, oldest first.
    pub fn drain(&mut self, id: &str) -> Vec<String> {
        self.queues
            .remove(id)
            .map(Vec::from)
            .unwrap_or_default()
    }

    pub fn pending(&self, id: &str) -> usize {
        self.queues.get(id).map(VecDeque::len).unwrap_or(0)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.queues.contains_key(id)
    }
}
