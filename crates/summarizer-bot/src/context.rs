//! Bounded conversation context.
//!
//! Keeps the most recent turns of a thread conversation for the remote
//! summarizer call. Capacity is fixed at construction; the oldest entry
//! is evicted once the buffer is full. Guarded by an async lock because
//! the gateway dispatches events concurrently.

#[path = "context_tests.rs"]
mod context_tests;

use std::collections::VecDeque;

use summarizer_types::ContextEntry;
use tokio::sync::RwLock;

pub struct ContextBuffer {
    entries: RwLock<VecDeque<ContextEntry>>,
    capacity: usize,
}

impl ContextBuffer {
    /// Create a buffer holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest one when full.
    pub async fn push(&self, entry: ContextEntry) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.write().await;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Entries in push order, oldest first.
    pub async fn snapshot(&self) -> Vec<ContextEntry> {
        let entries = self.entries.read().await;
        entries.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
