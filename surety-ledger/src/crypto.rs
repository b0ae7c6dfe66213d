//! Hashing for the ledger
//!
//! This module provides:
//! - Flight key derivation over a canonical byte encoding
//! - SHA-256 chaining of audit events
//! - Merkle roots over the audit log for external anchoring

use crate::events::EventKind;
use crate::types::Address;
use crate::Result;
use sha2::{Digest, Sha256};

/// Digest of `(airline, flight code, timestamp)`
///
/// Encoding: `airline (20 bytes) || len(code) as u64 BE || code || timestamp as u64 BE`.
/// The length prefix keeps `("AB", "C")`-style splits from colliding.
pub fn flight_key_digest(airline: &Address, flight_code: &str, timestamp: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(airline.as_bytes());
    hasher.update((flight_code.len() as u64).to_be_bytes());
    hasher.update(flight_code.as_bytes());
    hasher.update(timestamp.to_be_bytes());
    hasher.finalize().into()
}

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Chain hash of an audit event
pub fn hash_event(previous_hash: &[u8; 32], sequence: u64, kind: &EventKind) -> Result<[u8; 32]> {
    let payload = bincode::serialize(kind)?;

    let mut hasher = Sha256::new();
    hasher.update(previous_hash);
    hasher.update(&payload);
    hasher.update(sequence.to_be_bytes());
    Ok(hasher.finalize().into())
}

/// Create a Merkle root from event hashes
///
/// If a level has odd length, the last hash is duplicated.
pub fn merkle_root(event_hashes: &[[u8; 32]]) -> [u8; 32] {
    if event_hashes.is_empty() {
        return [0u8; 32];
    }

    let mut current_level: Vec<[u8; 32]> = event_hashes.to_vec();

    while current_level.len() > 1 {
        current_level = current_level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);

                let mut hasher = Sha256::new();
                hasher.update(left);
                hasher.update(right);
                hasher.finalize().into()
            })
            .collect();
    }

    current_level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flight_key_length_prefix() {
        let airline = Address::from_low_u64(1);
        // Same concatenated bytes, different split
        let a = flight_key_digest(&airline, "AB", 0);
        let b = flight_key_digest(&airline, "A", 0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_flight_key_encoding() {
        let airline = Address::from_low_u64(1);
        let code = "ND1309";

        let mut bytes = airline.as_bytes().to_vec();
        bytes.extend_from_slice(&6u64.to_be_bytes());
        bytes.extend_from_slice(code.as_bytes());
        bytes.extend_from_slice(&10u64.to_be_bytes());

        assert_eq!(flight_key_digest(&airline, code, 10), hash_bytes(&bytes));
    }

    #[test]
    fn test_flight_key_long_code() {
        let airline = Address::from_low_u64(1);
        let code = "X".repeat(70_000);

        let mut bytes = airline.as_bytes().to_vec();
        bytes.extend_from_slice(&(code.len() as u64).to_be_bytes());
        bytes.extend_from_slice(code.as_bytes());
        bytes.extend_from_slice(&0u64.to_be_bytes());

        assert_eq!(flight_key_digest(&airline, &code, 0), hash_bytes(&bytes));
        assert_ne!(
            flight_key_digest(&airline, &code, 0),
            flight_key_digest(&airline, &code[1..], 0)
        );
    }

    #[test]
    fn test_flight_key_depends_on_airline() {
        let a = flight_key_digest(&Address::from_low_u64(1), "ND1309", 10);
        let b = flight_key_digest(&Address::from_low_u64(2), "ND1309", 10);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_bytes() {
        let hash1 = hash_bytes(b"test data");
        let hash2 = hash_bytes(b"test data");
        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash_bytes(b"different data"));
    }

    #[test]
    fn test_hash_event_chains_previous() {
        let kind = EventKind::AirlineFunded {
            airline: Address::from_low_u64(9),
        };
        let h1 = hash_event(&[0u8; 32], 0, &kind).unwrap();
        let h2 = hash_event(&[1u8; 32], 0, &kind).unwrap();
        let h3 = hash_event(&[0u8; 32], 1, &kind).unwrap();
        assert_ne!(h1, h2);
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_merkle_root_empty() {
        assert_eq!(merkle_root(&[]), [0u8; 32]);
    }

    #[test]
    fn test_merkle_root_single() {
        let hash = [1u8; 32];
        assert_eq!(merkle_root(&[hash]), hash);
    }

    #[test]
    fn test_merkle_root_two() {
        let hash1 = [1u8; 32];
        let hash2 = [2u8; 32];

        let mut hasher = Sha256::new();
        hasher.update(hash1);
        hasher.update(hash2);
        let expected: [u8; 32] = hasher.finalize().into();

        assert_eq!(merkle_root(&[hash1, hash2]), expected);
    }

    #[test]
    fn test_merkle_root_odd_duplicates_last() {
        let (a, b, c) = ([1u8; 32], [2u8; 32], [3u8; 32]);
        assert_eq!(merkle_root(&[a, b, c]), merkle_root(&[a, b, c, c]));
    }
}
