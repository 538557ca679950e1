//! Keyed message authentication codes
//!
//! The MAC is BLAKE3 in keyed mode. It is a pure function of the key and the
//! payload, touches no shared state and can be called from any thread.

use std::fmt;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use super::key::Key;

/// Size of a MAC in bytes (256 bits)
pub const MAC_SIZE: usize = blake3::OUT_LEN;

/// Authentication tag over a token payload
///
/// Equality is constant-time over the full tag length, so comparing a
/// presented MAC against a recomputed one leaks nothing about where they
/// first differ.
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct Mac([u8; MAC_SIZE]);

impl Mac {
    /// Get a reference to the raw tag bytes
    pub fn bytes(&self) -> &[u8; MAC_SIZE] {
        &self.0
    }

    /// Convert the tag to a hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; MAC_SIZE]> for Mac {
    fn from(bytes: [u8; MAC_SIZE]) -> Self {
        Mac(bytes)
    }
}

impl PartialEq for Mac {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for Mac {}

impl fmt::Debug for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mac({})", self.to_hex())
    }
}

/// Compute the MAC of `payload` under `key`
pub fn compute_mac(key: &Key, payload: &[u8]) -> Mac {
    Mac(*blake3::keyed_hash(key.bytes(), payload).as_bytes())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mac_is_deterministic() {
        let key = Key::from([7u8; 32]);
        let a = compute_mac(&key, b"payload");
        let b = compute_mac(&key, b"payload");
        assert_eq!(a, b);
    }

    #[test]
    fn test_mac_depends_on_key_and_payload() {
        let k1 = Key::from([1u8; 32]);
        let k2 = Key::from([2u8; 32]);
        assert_ne!(compute_mac(&k1, b"payload"), compute_mac(&k2, b"payload"));
        assert_ne!(compute_mac(&k1, b"payload"), compute_mac(&k1, b"payloae"));
    }

    #[test]
    fn test_mac_matches_keyed_blake3() {
        let raw = [9u8; 32];
        let key = Key::from(raw);
        let expected = blake3::keyed_hash(&raw, b"abc");
        assert_eq!(compute_mac(&key, b"abc").bytes(), expected.as_bytes());
    }

    #[test]
    fn test_single_bit_difference_is_unequal() {
        let key = Key::from([3u8; 32]);
        let mac = compute_mac(&key, b"data");
        for i in 0..MAC_SIZE {
            let mut bytes = *mac.bytes();
            bytes[i] ^= 0x01;
            assert_ne!(mac, Mac::from(bytes));
        }
    }
}
