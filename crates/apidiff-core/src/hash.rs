use std::fmt;

use serde::{Deserialize, Serialize};

/// Type alias representing the 64-bit hash code used for fingerprints and cache keys.
///
/// ```
/// # use apidiff_core::hash_bytes;
/// let code = hash_bytes(b"apidiff");
/// assert_eq!(code.len(), 8);
/// ```
pub type HashCode = [u8; 8];

/// Compute the FNV-1a hash of the provided bytes.
///
/// ```
/// # use apidiff_core::hash_bytes;
/// let code = hash_bytes(b"Order.Total");
/// let same = hash_bytes(b"Order.Total");
/// assert_eq!(code, same);
/// ```
#[must_use]
pub fn hash_bytes(input: &[u8]) -> HashCode {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET_BASIS;
    for byte in input {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash.to_le_bytes()
}

/// Combine a collection of hash codes into a single order-independent hash.
///
/// ```
/// # use apidiff_core::{combine, hash_bytes};
/// let forward = combine(vec![hash_bytes(b"a"), hash_bytes(b"b")]);
/// let backward = combine(vec![hash_bytes(b"b"), hash_bytes(b"a")]);
/// assert_eq!(forward, backward);
/// ```
#[must_use]
pub fn combine(mut codes: Vec<HashCode>) -> HashCode {
    codes.sort_unstable();
    let mut bytes = Vec::with_capacity(codes.len() * 8);
    for code in codes {
        bytes.extend_from_slice(&code);
    }
    hash_bytes(&bytes)
}

/// Stable content hash of a rule set.
///
/// Two rule sets with the same rules, in any insertion order, share a
/// fingerprint. External result caches key on it together with a hash of the
/// compared inputs.
///
/// ```
/// # use apidiff_core::Fingerprint;
/// let fp = Fingerprint::of_bytes(b"{}");
/// assert_eq!(fp.to_string().len(), 16);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Hashes the canonical serialized form of a rule set.
    #[must_use]
    pub fn of_bytes(canonical: &[u8]) -> Self {
        Self(u64::from_le_bytes(hash_bytes(canonical)))
    }

    /// Returns the raw 64-bit value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv_matches_reference_vectors() {
        assert_eq!(u64::from_le_bytes(hash_bytes(b"")), 0xcbf29ce484222325);
        assert_eq!(u64::from_le_bytes(hash_bytes(b"a")), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn fingerprint_renders_as_fixed_width_hex() {
        let fp = Fingerprint::of_bytes(b"");
        assert_eq!(fp.to_string(), "cbf29ce484222325");
    }
}
