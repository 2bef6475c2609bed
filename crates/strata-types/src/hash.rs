use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Content digest of a stored blob (BLAKE3).
///
/// Identical content always produces the same `ContentHash`, which makes it
/// the primary deduplication key: two files with the same digest share one
/// physical blob.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Compute the digest of a complete in-memory buffer.
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Wrap a digest computed incrementally (e.g. while streaming).
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// Incremental hasher for streaming content.
    pub fn hasher() -> Hasher {
        Hasher(blake3::Hasher::new())
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation for log output (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string (64 hex characters).
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

/// Incremental digest computation over streamed content.
pub struct Hasher(blake3::Hasher);

impl Hasher {
    /// Feed a chunk of content.
    pub fn update(&mut self, chunk: &[u8]) {
        self.0.update(chunk);
    }

    /// Finish and produce the digest.
    pub fn finalize(self) -> ContentHash {
        ContentHash(*self.0.finalize().as_bytes())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.short_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(ContentHash::of(b"hello"), ContentHash::of(b"hello"));
    }

    #[test]
    fn different_content_differs() {
        assert_ne!(ContentHash::of(b"hello"), ContentHash::of(b"world"));
    }

    #[test]
    fn streaming_matches_oneshot() {
        let mut h = ContentHash::hasher();
        h.update(b"hello ");
        h.update(b"world");
        assert_eq!(h.finalize(), ContentHash::of(b"hello world"));
    }

    #[test]
    fn hex_roundtrip() {
        let h = ContentHash::of(b"content");
        assert_eq!(ContentHash::from_hex(&h.to_hex()).unwrap(), h);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert!(ContentHash::from_hex("abcd").is_err());
        assert!(ContentHash::from_hex("zz").is_err());
    }

    #[test]
    fn display_is_full_hex() {
        let h = ContentHash::of(b"x");
        assert_eq!(format!("{h}").len(), 64);
    }

    proptest::proptest! {
        #[test]
        fn hex_roundtrip_any_digest(bytes in proptest::array::uniform32(0u8..)) {
            let h = ContentHash::from_hash(bytes);
            let parsed = ContentHash::from_hex(&h.to_hex()).unwrap();
            proptest::prop_assert_eq!(h, parsed);
        }
    }
}
