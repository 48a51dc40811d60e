//! Bounded in-memory record of recent delivery attempts.

use std::collections::VecDeque;
use std::sync::Mutex;

use sendloop_core::types::DeliveryLogEntry;

/// Fixed-capacity ring buffer of delivery attempts. One entry is appended
/// per gateway call (including intermediate retry attempts); the oldest
/// entry is evicted once the capacity is reached.
pub struct MessageLog {
    entries: Mutex<VecDeque<DeliveryLogEntry>>,
    capacity: usize,
}

impl MessageLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    /// Append an attempt outcome, evicting the oldest entry at capacity.
    pub fn append(&self, entry: DeliveryLogEntry) {
        let mut entries = self.entries.lock().unwrap();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// The `limit` most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<DeliveryLogEntry> {
        let entries = self.entries.lock().unwrap();
        entries.iter().rev().take(limit).cloned().collect()
    }

    /// Drop all entries (administrative action).
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
        tracing::info!("🗑️ Delivery log cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(500)
    }
}
