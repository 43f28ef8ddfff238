//! Address parsing and normalization.
//!
//! Addresses arrive from the indexing endpoint and the screening service as
//! strings in arbitrary case. They are compared as 20-byte values, so case
//! never matters after parsing; checksum (EIP-55) casing is only a rendering
//! concern and is produced by `Address`'s `Display`.

use alloy_primitives::Address;
use std::collections::HashSet;

use crate::error::{CoreError, Result};

/// Parse an address in any case, with or without `0x` prefix.
///
/// Input is lowercased before parsing so a mis-cased checksum is not rejected.
pub fn parse_address(input: &str) -> Result<Address> {
    let normalized = input.trim().to_ascii_lowercase();
    normalized
        .parse::<Address>()
        .map_err(|_| CoreError::InvalidAddress(input.to_string()))
}

/// Deduplicate addresses, keeping first-seen order.
pub fn unique_in_order<I>(addresses: I) -> Vec<Address>
where
    I: IntoIterator<Item = Address>,
{
    let mut seen = HashSet::new();
    addresses
        .into_iter()
        .filter(|address| seen.insert(*address))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_any_case() {
        let lower = parse_address("0xeced91232c609a42f6016860e8223b8aecaa7bd0").unwrap();
        let upper = parse_address("0xECED91232C609A42F6016860E8223B8AECAA7BD0").unwrap();
        let bare = parse_address("eced91232c609a42f6016860e8223b8aecaa7bd0").unwrap();

        assert_eq!(lower, upper);
        assert_eq!(lower, bare);
    }

    #[test]
    fn test_parse_address_rejects_garbage() {
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("not an address").is_err());
        assert_eq!(
            parse_address("").unwrap_err(),
            CoreError::InvalidAddress(String::new())
        );
    }

    #[test]
    fn test_unique_in_order_drops_repeats() {
        let a = Address::repeat_byte(0x0a);
        let b = Address::repeat_byte(0x0b);
        let c = Address::repeat_byte(0x0c);

        assert_eq!(unique_in_order([b, a, b, c, a]), vec![b, a, c]);
        assert!(unique_in_order(Vec::new()).is_empty());
    }

    #[test]
    fn test_unique_in_order_after_parse_ignores_case() {
        let parsed = [
            "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed",
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xeced91232c609a42f6016860e8223b8aecaa7bd0",
        ]
        .iter()
        .map(|s| parse_address(s).unwrap());

        let unique = unique_in_order(parsed);

        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].to_string(), "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
    }

    #[test]
    fn test_display_is_checksummed() {
        let addr = parse_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(addr.to_string(), "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
    }
}
