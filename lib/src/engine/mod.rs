// RFC 8554 signature engine (LM-OTS, LMS, HSS) over SHA-256
//
// The engine is deterministic: every secret value is derived from the
// master seed, so the same private state and message digest always yield
// the same signature bytes. Callers never touch it directly; the key
// lifecycle and session layer in `crate::hss` sequences it.

pub(crate) mod hash;
pub(crate) mod lmots;
pub(crate) mod lms;
pub(crate) mod merkle;
pub(crate) mod tree;

pub use hash::Node;
pub(crate) use merkle::{default_split, MerkleTree};
pub use tree::{public_key_len, signature_len, verify, MasterSecret};
pub(crate) use tree::{aux_key, public_key_from_top, tree_secret, Hierarchy};
