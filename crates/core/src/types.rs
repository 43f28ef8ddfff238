//! Core domain types for the backing relayer.

use alloy_primitives::{hex, Address, B256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Identifier of a backing event: `{tx_hash}_{backer}_{instance}` in lowercase hex.
///
/// Two rows describing the same backing in the same transaction always map to
/// the same identifier, whatever case the indexing endpoint used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Derive the identifier from its three components.
    pub fn derive(transaction_hash: &B256, backer: &Address, instance: &Address) -> Self {
        Self(format!(
            "{}_{}_{}",
            hex::encode_prefixed(transaction_hash),
            hex::encode_prefixed(backer),
            hex::encode_prefixed(instance)
        ))
    }

    /// Borrow the identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A `CirclesBackingCompleted` occurrence.
///
/// Fields are private so the identifier can never drift from the data it was
/// derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackingEvent {
    event_id: EventId,
    backer: Address,
    instance: Address,
    block_number: u64,
    transaction_hash: B256,
}

impl BackingEvent {
    /// Create an event, deriving its identifier.
    pub fn new(backer: Address, instance: Address, block_number: u64, transaction_hash: B256) -> Self {
        Self {
            event_id: EventId::derive(&transaction_hash, &backer, &instance),
            backer,
            instance,
            block_number,
            transaction_hash,
        }
    }

    /// Unique identifier of this event.
    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    /// Address that completed the backing.
    pub fn backer(&self) -> Address {
        self.backer
    }

    /// Backing instance contract created for the backer.
    pub fn instance(&self) -> Address {
        self.instance
    }

    /// Block the event was emitted in.
    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// Transaction that emitted the event.
    pub fn transaction_hash(&self) -> B256 {
        self.transaction_hash
    }
}

/// Inclusive block range `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRange {
    from: u64,
    to: u64,
}

impl BlockRange {
    /// Create a range, validating `from <= to`.
    pub fn new(from: u64, to: u64) -> Result<Self, CoreError> {
        if from > to {
            return Err(CoreError::InvalidRange { from, to });
        }
        Ok(Self { from, to })
    }

    /// Range of blocks after `cursor` up to and including `head`.
    ///
    /// Returns `None` when the head has not moved past the cursor.
    pub fn after(cursor: u64, head: u64) -> Option<Self> {
        if head <= cursor {
            return None;
        }
        Some(Self {
            from: cursor + 1,
            to: head,
        })
    }

    /// First block of the range.
    pub const fn from(&self) -> u64 {
        self.from
    }

    /// Last block of the range.
    pub const fn to(&self) -> u64 {
        self.to
    }

    /// Number of blocks covered.
    pub const fn len(&self) -> u64 {
        self.to - self.from + 1
    }

    /// Always false; a range covers at least one block.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Whether `block` lies inside the range.
    pub const fn contains(&self, block: u64) -> bool {
        block >= self.from && block <= self.to
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}

/// Outcome of a mined trust-batch transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustReceipt {
    /// Hash of the mined transaction
    pub transaction_hash: B256,
    /// Block the transaction was included in
    pub block_number: u64,
    /// Execution status: 1 = success, 0 = reverted
    pub status: u8,
}

impl TrustReceipt {
    /// Whether the transaction executed successfully.
    pub const fn is_success(&self) -> bool {
        self.status == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_is_lowercase_and_stable() {
        let tx = B256::repeat_byte(0xab);
        let backer: Address = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".parse().unwrap();
        let instance = Address::repeat_byte(0x11);

        let event = BackingEvent::new(backer, instance, 42, tx);
        let expected = format!(
            "0x{}_0x{}_0x{}",
            "ab".repeat(32),
            "aa".repeat(20),
            "11".repeat(20)
        );

        assert_eq!(event.event_id().as_str(), expected);
        assert_eq!(
            event.event_id(),
            BackingEvent::new(backer, instance, 42, tx).event_id()
        );
    }

    #[test]
    fn test_event_id_distinguishes_instances() {
        let tx = B256::repeat_byte(0x01);
        let backer = Address::repeat_byte(0x02);

        let first = BackingEvent::new(backer, Address::repeat_byte(0x03), 1, tx);
        let second = BackingEvent::new(backer, Address::repeat_byte(0x04), 1, tx);

        assert_ne!(first.event_id(), second.event_id());
    }

    #[test]
    fn test_block_range_after() {
        assert_eq!(BlockRange::after(1000, 1000), None);
        assert_eq!(BlockRange::after(1000, 999), None);

        let range = BlockRange::after(1000, 1010).unwrap();
        assert_eq!(range.from(), 1001);
        assert_eq!(range.to(), 1010);
        assert_eq!(range.len(), 10);
        assert!(range.contains(1001));
        assert!(range.contains(1010));
        assert!(!range.contains(1000));
        assert_eq!(range.to_string(), "1001..=1010");
    }

    #[test]
    fn test_block_range_validation() {
        assert!(BlockRange::new(5, 5).is_ok());
        assert_eq!(
            BlockRange::new(6, 5).unwrap_err(),
            CoreError::InvalidRange { from: 6, to: 5 }
        );
    }

    #[test]
    fn test_receipt_status() {
        let mut receipt = TrustReceipt {
            transaction_hash: B256::ZERO,
            block_number: 7,
            status: 1,
        };
        assert!(receipt.is_success());

        receipt.status = 0;
        assert!(!receipt.is_success());
    }

    #[test]
    fn test_event_serde() {
        let event = BackingEvent::new(
            Address::repeat_byte(0x01),
            Address::repeat_byte(0x02),
            9,
            B256::repeat_byte(0x03),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: BackingEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
