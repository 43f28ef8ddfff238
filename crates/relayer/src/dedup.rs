//! In-memory record of backing events already acted upon.
//!
//! The set only grows. It lives for the process lifetime and is rebuilt
//! empty on restart; the restart cursor bounds how much is re-fetched.

use backing_core::EventId;
use std::collections::HashSet;

/// Append-only set of processed event identifiers.
#[derive(Debug, Default, Clone)]
pub struct EventDeduplicator {
    processed: HashSet<EventId>,
}

impl EventDeduplicator {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `event_id` has not been processed yet.
    pub fn is_new(&self, event_id: &EventId) -> bool {
        !self.processed.contains(event_id)
    }

    /// Record `event_id` as processed. Returns false if it already was.
    pub fn mark_processed(&mut self, event_id: EventId) -> bool {
        self.processed.insert(event_id)
    }

    /// Number of processed events.
    pub fn len(&self) -> usize {
        self.processed.len()
    }

    /// Whether nothing has been processed yet.
    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backing_core::{Address, B256};

    fn id(byte: u8) -> EventId {
        EventId::derive(
            &B256::repeat_byte(byte),
            &Address::repeat_byte(byte),
            &Address::repeat_byte(byte),
        )
    }

    #[test]
    fn test_mark_and_check() {
        let mut dedup = EventDeduplicator::new();
        assert!(dedup.is_empty());
        assert!(dedup.is_new(&id(1)));

        assert!(dedup.mark_processed(id(1)));
        assert!(!dedup.is_new(&id(1)));
        assert!(dedup.is_new(&id(2)));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_mark_twice_is_noop() {
        let mut dedup = EventDeduplicator::new();
        assert!(dedup.mark_processed(id(3)));
        assert!(!dedup.mark_processed(id(3)));
        assert_eq!(dedup.len(), 1);
    }
}
