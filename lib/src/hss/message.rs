// Message digesting for pre-hash signing
//
// Signatures cover SHA-256(message); the engine only ever sees the 32-byte
// digest, which is what lets sessions accept the message in pieces.

use sha2::{Digest, Sha256};

pub const DIGEST_LEN: usize = 32;

/// Running SHA-256 over message bytes fed in any number of chunks
#[derive(Clone, Default)]
pub struct MessageDigest {
    hasher: Sha256,
    len: u64,
}

impl MessageDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.len += chunk.len() as u64;
    }

    /// Bytes absorbed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn finalize(self) -> [u8; DIGEST_LEN] {
        self.hasher.finalize().into()
    }

    /// Digest of a message held entirely in memory.
    ///
    /// Postconditions: identical to feeding `message` through `update` in
    /// any split.
    pub fn preprocess(message: &[u8]) -> [u8; DIGEST_LEN] {
        let mut digest = Self::new();
        digest.update(message);
        digest.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_matches_standard_sha256() {
        let message = b"Test message for SHA-256 verification";
        assert_eq!(
            MessageDigest::preprocess(message),
            Sha256::digest(message).as_slice(),
            "Should match standard SHA-256 implementation"
        );
    }

    #[test]
    fn test_chunking_does_not_change_digest() {
        let mut split = MessageDigest::new();
        split.update(b"abc");
        split.update(b"");
        split.update(b"defgh");
        assert_eq!(split.len(), 8);
        assert_eq!(split.finalize(), MessageDigest::preprocess(b"abcdefgh"));
    }

    #[test]
    fn test_byte_by_byte_large_message() {
        let message = vec![0x42u8; 10_000];
        let mut digest = MessageDigest::new();
        for byte in &message {
            digest.update(std::slice::from_ref(byte));
        }
        assert_eq!(digest.finalize(), MessageDigest::preprocess(&message));
    }

    #[test]
    fn test_empty_message() {
        let digest = MessageDigest::new();
        assert!(digest.is_empty());
        assert_eq!(digest.finalize(), Sha256::digest(b"").as_slice());
    }
}
