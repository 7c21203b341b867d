use std::fmt;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

/// SHA-256 digest width in bytes.
pub const DIGEST_LEN: usize = 32;

/// Hex characters per storage directory level. 16^3 keeps every shard
/// directory below 4096 children, well under common filesystem limits.
pub const SHARD_WIDTH: usize = 3;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Content fingerprint of one phrase: the SHA-256 digest of its exact bytes.
///
/// Ordering is plain byte order of the digest, which is also the
/// lexicographic order of the hex form used for shard paths.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; DIGEST_LEN]);

/// One-shot fingerprint of a complete byte sequence.
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    Fingerprint(Sha256::digest(bytes).into())
}

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(DIGEST_LEN * 2);
        for &byte in self.0.iter() {
            hex.push(HEX_DIGITS[(byte >> 4) as usize] as char);
            hex.push(HEX_DIGITS[(byte & 0x0f) as usize] as char);
        }
        hex
    }

    /// Parses the 64-char hex form back into a fingerprint.
    pub fn from_hex(hex: &str) -> Option<Fingerprint> {
        let raw = hex.as_bytes();
        if raw.len() != DIGEST_LEN * 2 {
            return None;
        }
        let mut digest = [0u8; DIGEST_LEN];
        for (i, pair) in raw.chunks(2).enumerate() {
            let high = hex_nibble(pair[0])?;
            let low = hex_nibble(pair[1])?;
            digest[i] = (high << 4) | low;
        }
        Some(Fingerprint(digest))
    }

    /// Relative directory path for this fingerprint: the hex form split into
    /// groups of `SHARD_WIDTH` chars, one directory level per group.
    pub fn shard_path(&self) -> PathBuf {
        let hex = self.to_hex();
        let mut path = PathBuf::new();
        for group in hex.as_bytes().chunks(SHARD_WIDTH) {
            let level: String = group.iter().map(|&b| b as char).collect();
            path.push(level);
        }
        path
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Incremental fingerprinting for phrases that arrive in segments.
///
/// Feeding the same bytes in any segmentation yields the same digest as the
/// one-shot `fingerprint`. `finish` resets the builder for the next phrase.
pub struct FingerprintBuilder {
    hasher: Sha256,
}

impl FingerprintBuilder {
    pub fn new() -> Self {
        FingerprintBuilder {
            hasher: Sha256::new(),
        }
    }

    pub fn update(&mut self, segment: &[u8]) {
        self.hasher.update(segment);
    }

    pub fn finish(&mut self) -> Fingerprint {
        Fingerprint(self.hasher.finalize_reset().into())
    }
}

impl Default for FingerprintBuilder {
    fn default() -> Self {
        FingerprintBuilder::new()
    }
}
