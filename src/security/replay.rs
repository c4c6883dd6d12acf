//! Replay detection for webhook deliveries.
//!
//! A delivery is identified by `sha256(signature + ":" + timestamp)`. Once a
//! key has been accepted, every later delivery with the same pair is a replay
//! regardless of its payload, until the sweep purges the key.

use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

/// Derive the replay key for a (signature, timestamp) pair.
pub fn replay_key(signature: &str, timestamp: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signature.as_bytes());
    hasher.update(b":");
    hasher.update(timestamp.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Default)]
pub struct ReplayGuard {
    seen: DashMap<String, Instant>,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains_key(key)
    }

    /// Remember `key`. Returns false if it was already present, which means a
    /// concurrent delivery of the same pair won the race.
    pub fn record(&self, key: String) -> bool {
        match self.seen.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                true
            }
        }
    }

    /// Forget keys first seen more than `max_age` ago.
    pub fn purge(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let before = self.seen.len();
        self.seen
            .retain(|_, first_seen| now.saturating_duration_since(*first_seen) <= max_age);
        before.saturating_sub(self.seen.len())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
