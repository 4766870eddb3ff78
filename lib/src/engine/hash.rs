// Domain-separated SHA-256 helpers

use hss_types::{HASH_LEN, ID_LEN};
use sha2::{Digest, Sha256};

/// A single n-byte hash value (tree node, chain element, seed).
pub type Node = [u8; HASH_LEN];

/// The 16-byte key pair identifier `I`.
pub type Identifier = [u8; ID_LEN];

pub const D_PBLC: u16 = 0x8080;
pub const D_MESG: u16 = 0x8181;
pub const D_LEAF: u16 = 0x8282;
pub const D_INTR: u16 = 0x8383;

// Derivation selectors for values RFC 8554 leaves to the implementation.
// They sit above every chain index so they never collide with x_q[i].
pub const D_RANDOMIZER: u16 = 0xfffd;
pub const D_CHILD_SEED: u16 = 0xfffc;
pub const D_CHILD_ID: u16 = 0xfffb;
pub const D_AUX_KEY: u16 = 0xfffa;

/// Hash the concatenation of `parts`.
pub fn sha256(parts: &[&[u8]]) -> Node {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Pseudorandom derivation of RFC 8554 Appendix A:
/// `H(I || u32str(q) || u16str(i) || u8str(0xff) || SEED)`.
pub fn derive(seed: &Node, id: &Identifier, q: u32, i: u16) -> Node {
    sha256(&[id, &q.to_be_bytes(), &i.to_be_bytes(), &[0xff], seed])
}

pub fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
}
