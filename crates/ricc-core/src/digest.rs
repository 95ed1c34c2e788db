//! Content digests — SHA-256 over canonical bytes, and over raw bytes.
//!
//! Two tiers, matching the two things this service hashes:
//!
//! - [`sha256_digest`] / [`sha256_canonical_hex`] take only [`CanonicalBytes`].
//!   This is the tier used for audit event hashes, derived-artifact JSON,
//!   and anything else whose digest must be reproducible across processes
//!   regardless of field insertion order.
//! - [`sha256_bytes`] / [`sha256_hex`] hash raw bytes directly — this is the
//!   tier for fingerprinting the uploaded PDF itself, which is not JSON and
//!   has no canonical form to speak of.
//!
//! Keeping these as distinct function names (rather than one overloaded
//! `sha256(...)`) makes it visible at every call site which contract is in
//! play.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    Sha256,
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("sha256")
    }
}

/// A content digest with its algorithm tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest {
    pub algorithm: DigestAlgorithm,
    pub bytes: [u8; 32],
}

impl ContentDigest {
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a lowercase 64-character hex digest.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let mut bytes = [0u8; 32];
        for i in 0..32 {
            bytes[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self { algorithm: DigestAlgorithm::Sha256, bytes })
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

/// The only public constructor path for a [`ContentDigest`] over JSON: it
/// accepts `&CanonicalBytes`, not raw bytes, so a digest computed for hashing
/// purposes can never accidentally skip canonicalization.
pub fn sha256_digest(canonical: &CanonicalBytes) -> ContentDigest {
    let hash = Sha256::digest(canonical.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    ContentDigest { algorithm: DigestAlgorithm::Sha256, bytes }
}

pub fn sha256_canonical_hex(canonical: &CanonicalBytes) -> String {
    sha256_digest(canonical).to_hex()
}

/// Hash raw bytes directly (no canonicalization) — used for the PDF
/// fingerprint and for hashing already-serialized artifact byte strings
/// whose canonical form was produced upstream (e.g. stable_text, which is
/// plain text, not JSON).
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let hash = Sha256::digest(data);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    bytes
}

pub fn sha256_hex(data: &[u8]) -> String {
    sha256_bytes(data).iter().map(|b| format!("{b:02x}")).collect()
}

/// Streaming accumulator for hashing data that arrives in chunks (e.g. a PDF
/// read from an evidence store in pieces rather than loaded whole).
#[derive(Default)]
pub struct Sha256Accumulator(Sha256);

impl Sha256Accumulator {
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.0.update(chunk);
    }

    pub fn finalize_hex(self) -> String {
        self.0.finalize().iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector_object() {
        let cb = CanonicalBytes::new(&serde_json::json!({"a": 1, "b": 2})).unwrap();
        let digest = sha256_digest(&cb);
        assert_eq!(
            digest.to_hex(),
            "43258cff783fe7036d8a43033f830adfc60ec037382473548ac742b888292777"
        );
    }

    #[test]
    fn hex_round_trip() {
        let cb = CanonicalBytes::new(&"hello").unwrap();
        let digest = sha256_digest(&cb);
        let hex = digest.to_hex();
        let parsed = ContentDigest::from_hex(&hex).unwrap();
        assert_eq!(digest.bytes, parsed.bytes);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert!(ContentDigest::from_hex("abcd").is_none());
    }

    #[test]
    fn raw_bytes_digest_matches_known_sha256() {
        // echo -n "" | sha256sum
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"[..64]
        );
    }

    #[test]
    fn accumulator_matches_one_shot() {
        let mut acc = Sha256Accumulator::new();
        acc.update(b"hello ");
        acc.update(b"world");
        assert_eq!(acc.finalize_hex(), sha256_hex(b"hello world"));
    }
}
