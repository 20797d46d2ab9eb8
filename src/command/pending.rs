//! Outstanding request callbacks and their correlation ids.
//!
//! Ids are drawn from a fixed numeric range; 0-9 are reserved and mean "no
//! callback expected" on the wire. The set is insertion-ordered and is
//! mutated only by append, take-by-id, and take-expired.

use std::time::Instant;

use serde_json::Value;

/// Lowest assignable correlation id (0-9 are reserved).
pub const CALLBACK_ID_MIN: u32 = 10;

/// Highest assignable correlation id.
pub const CALLBACK_ID_MAX: u32 = 999_999_999;

/// Outcome delivered to a registered callback, exactly once.
#[derive(Debug)]
pub enum Completion {
    /// A correlated response arrived; carries its `info` payload when the
    /// response had one.
    Reply(Option<Value>),
    /// The request expired before a response arrived.
    TimedOut,
}

/// Callback invoked when an outbound request completes.
pub type Callback = Box<dyn FnOnce(Completion) + Send>;

/// One outstanding request awaiting a correlated response.
pub struct PendingCallback {
    pub id: u32,
    pub callback: Callback,
    /// Absent means the request never times out.
    pub expiry: Option<Instant>,
}

/// Insertion-ordered set of outstanding callbacks.
#[derive(Default)]
pub struct PendingCallbackSet {
    entries: Vec<PendingCallback>,
}

impl PendingCallbackSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new entry. The caller guarantees id uniqueness via
    /// [`unused_id`].
    pub fn insert(&mut self, entry: PendingCallback) {
        debug_assert!(!self.contains(entry.id));
        self.entries.push(entry);
    }

    /// Check whether an id is currently outstanding.
    pub fn contains(&self, id: u32) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Remove and return the entry with the given id.
    ///
    /// Removal hands the entry (and its FnOnce callback) to the caller, so
    /// removal and invocation cannot race or repeat.
    pub fn take(&mut self, id: u32) -> Option<PendingCallback> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Remove and return every entry whose expiry has elapsed at `now`,
    /// in insertion order. Entries without an expiry are never returned.
    pub fn take_expired(&mut self, now: Instant) -> Vec<PendingCallback> {
        let mut expired = Vec::new();
        let mut index = 0;
        while index < self.entries.len() {
            let is_expired = self.entries[index]
                .expiry
                .is_some_and(|expiry| now >= expiry);
            if is_expired {
                expired.push(self.entries.remove(index));
            } else {
                index += 1;
            }
        }
        expired
    }

    /// Outstanding ids, in insertion order.
    pub fn ids(&self) -> Vec<u32> {
        self.entries.iter().map(|e| e.id).collect()
    }

    /// Number of outstanding entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no entries are outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Draw candidate ids from `gen` until one is in range and not outstanding.
///
/// The generator is injectable so tests can force collisions; production
/// callers pass a closure over [`rand::Rng::random_range`].
pub fn unused_id<F: FnMut() -> u32>(pending: &PendingCallbackSet, mut gen: F) -> u32 {
    loop {
        let id = gen();
        if (CALLBACK_ID_MIN..=CALLBACK_ID_MAX).contains(&id) && !pending.contains(id) {
            return id;
        }
    }
}
