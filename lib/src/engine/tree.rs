// HSS hierarchy of LMS trees (RFC 8554 section 6)

use super::hash::{derive, read_u32, Identifier, Node, D_AUX_KEY, D_CHILD_ID, D_CHILD_SEED};
use super::lms;
use super::merkle::{default_split, MerkleTree, TreeSecret};
use crate::hss::config::Level;
use crate::hss::leaf::LeafPosition;
use hss_types::{ID_LEN, MAX_LEVELS};
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Seed and identifier drawn at key generation; every tree of the
/// hierarchy is derived from them.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret {
    pub seed: Node,
    pub id: Identifier,
}

/// Secret of tree `tree_index` at `level`. The top tree uses the master
/// secret itself.
pub fn tree_secret(master: &MasterSecret, level: usize, tree_index: u64) -> TreeSecret {
    if level == 0 {
        return TreeSecret { seed: master.seed, id: master.id };
    }
    // Fold level and tree index into a 32-bit diversifier plus the selector.
    let diversifier = (tree_index as u32) ^ ((tree_index >> 32) as u32).rotate_left(8) ^ ((level as u32) << 28);
    let mut context = master.id;
    context[..8].iter_mut().zip(tree_index.to_be_bytes()).for_each(|(b, t)| *b ^= t);
    context[ID_LEN - 1] ^= level as u8;

    let seed = derive(&master.seed, &context, diversifier, D_CHILD_SEED);
    let id_material = derive(&master.seed, &context, diversifier, D_CHILD_ID);
    let mut id = [0u8; ID_LEN];
    id.copy_from_slice(&id_material[..ID_LEN]);
    TreeSecret { seed, id }
}

/// MAC key for the accelerator cache tag.
pub fn aux_key(master: &MasterSecret) -> Node {
    derive(&master.seed, &master.id, 0, D_AUX_KEY)
}

pub fn public_key_len() -> usize {
    4 + lms::PUBLIC_KEY_LEN
}

pub fn signature_len(levels: &[Level]) -> usize {
    let mut len = 4;
    for (i, level) in levels.iter().enumerate() {
        len += lms::signature_len(level.lms, level.ots);
        if i + 1 < levels.len() {
            len += lms::PUBLIC_KEY_LEN;
        }
    }
    len
}

/// `u32 L || LMS public key of the top tree`.
pub fn public_key_from_top(levels: usize, top: &MerkleTree) -> Vec<u8> {
    let mut out = Vec::with_capacity(public_key_len());
    out.extend_from_slice(&(levels as u32).to_be_bytes());
    out.extend_from_slice(&top.public_key());
    out
}

struct Slot {
    tree_index: u64,
    tree: MerkleTree,
    /// Signature of this tree's public key by the parent level; empty for
    /// the top tree.
    parent_signature: Vec<u8>,
}

/// The active tree at every level, ready to sign the leaf at a given
/// position.
pub struct Hierarchy {
    levels: Vec<Level>,
    slots: Vec<Slot>,
}

impl Hierarchy {
    /// Build the lower levels beneath an already constructed top tree.
    pub fn assemble(
        master: &MasterSecret,
        levels: &[Level],
        positions: &[LeafPosition],
        top: MerkleTree,
    ) -> Self {
        let mut hierarchy = Self {
            levels: levels.to_vec(),
            slots: Vec::with_capacity(levels.len()),
        };
        hierarchy.slots.push(Slot {
            tree_index: 0,
            tree: top,
            parent_signature: Vec::new(),
        });
        for i in 1..levels.len() {
            let slot = hierarchy.child_slot(master, i, positions);
            hierarchy.slots.push(slot);
        }
        hierarchy
    }

    /// Build the tree for `positions[level]` and have its parent sign it.
    fn child_slot(&mut self, master: &MasterSecret, level: usize, positions: &[LeafPosition]) -> Slot {
        let spec = self.levels[level];
        let tree_index = positions[level].tree_index;
        debug!(level, tree_index, "building subordinate tree");

        let tree = MerkleTree::build(
            spec.lms,
            spec.ots,
            tree_secret(master, level, tree_index),
            default_split(spec.lms.height()),
        );
        let parent_signature = self.slots[level - 1]
            .tree
            .sign(positions[level - 1].leaf, &tree.public_key());
        Slot {
            tree_index,
            tree,
            parent_signature,
        }
    }

    #[cfg(test)]
    pub fn public_key(&self) -> Vec<u8> {
        public_key_from_top(self.levels.len(), &self.slots[0].tree)
    }

    /// HSS signature of `digest` with the leaf at `positions`.
    ///
    /// Lower trees are replaced first when the position has moved past
    /// them; the caller guarantees `positions` belongs to an unused leaf.
    pub fn sign(&mut self, master: &MasterSecret, positions: &[LeafPosition], digest: &[u8]) -> Vec<u8> {
        for i in 1..self.levels.len() {
            if self.slots[i].tree_index != positions[i].tree_index {
                self.slots[i] = self.child_slot(master, i, positions);
            }
        }

        let bottom = self.levels.len() - 1;
        let mut out = Vec::with_capacity(signature_len(&self.levels));
        out.extend_from_slice(&(bottom as u32).to_be_bytes());
        for slot in &self.slots[1..] {
            out.extend_from_slice(&slot.parent_signature);
            out.extend_from_slice(&slot.tree.public_key());
        }
        let last = self.slots[bottom].tree.sign(positions[bottom].leaf, digest);
        out.extend_from_slice(&last);
        out
    }
}

/// Verify an HSS signature over `message`. Malformed input is `false`.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let levels = match read_u32(public_key, 0) {
        Some(l) if (1..=MAX_LEVELS as u32).contains(&l) => l,
        _ => return false,
    };
    if public_key.len() != public_key_len() {
        return false;
    }
    match read_u32(signature, 0) {
        Some(signed_keys) if signed_keys == levels - 1 => {}
        _ => return false,
    }

    let mut key = &public_key[4..];
    let mut rest = &signature[4..];
    for _ in 1..levels {
        let Some(sig_len) = lms::signature_len_prefix(rest) else {
            return false;
        };
        if rest.len() < sig_len + lms::PUBLIC_KEY_LEN {
            return false;
        }
        let (sig, tail) = rest.split_at(sig_len);
        let (child, tail) = tail.split_at(lms::PUBLIC_KEY_LEN);
        if !lms::verify(key, child, sig) {
            return false;
        }
        key = child;
        rest = tail;
    }
    lms::verify(key, message, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hss::leaf;
    use hss_types::HASH_LEN;

    fn master() -> MasterSecret {
        MasterSecret { seed: [9u8; HASH_LEN], id: [4u8; ID_LEN] }
    }

    fn levels(spec: &[(u32, u32)]) -> Vec<Level> {
        spec.iter().map(|&(h, w)| Level::new(h, w).unwrap()).collect()
    }

    fn hierarchy(levels: &[Level], counter: u64) -> Hierarchy {
        let m = master();
        let top = MerkleTree::build(levels[0].lms, levels[0].ots, tree_secret(&m, 0, 0), 2);
        Hierarchy::assemble(&m, levels, &leaf::positions(levels, counter), top)
    }

    #[test]
    fn test_child_secrets_are_distinct() {
        let m = master();
        let a = tree_secret(&m, 1, 0);
        let b = tree_secret(&m, 1, 1);
        let c = tree_secret(&m, 2, 0);
        assert_ne!(a.seed, b.seed);
        assert_ne!(a.id, b.id);
        assert_ne!(a.seed, c.seed);
        assert_eq!(tree_secret(&m, 0, 0).seed, m.seed);
    }

    #[test]
    fn test_two_level_signatures_verify_across_tree_boundary() {
        let lv = levels(&[(5, 1), (5, 1)]);
        let mut h = hierarchy(&lv, 30);
        let pk = h.public_key();
        let m = master();
        for counter in 30..36u64 {
            let sig = h.sign(&m, &leaf::positions(&lv, counter), b"digest");
            assert_eq!(sig.len(), signature_len(&lv));
            assert!(verify(&pk, b"digest", &sig), "counter {}", counter);
            assert!(!verify(&pk, b"digesT", &sig), "counter {}", counter);
        }
    }

    #[test]
    fn test_signing_depends_only_on_position() {
        let lv = levels(&[(5, 2), (5, 2)]);
        let m = master();
        let mut walked = hierarchy(&lv, 0);
        for counter in 0..33u64 {
            walked.sign(&m, &leaf::positions(&lv, counter), b"x");
        }
        let mut fresh = hierarchy(&lv, 33);
        let pos = leaf::positions(&lv, 33);
        assert_eq!(walked.sign(&m, &pos, b"y"), fresh.sign(&m, &pos, b"y"));
    }

    #[test]
    fn test_verify_rejects_level_count_mismatch() {
        let lv = levels(&[(5, 1)]);
        let mut h = hierarchy(&lv, 0);
        let mut pk = h.public_key();
        let sig = h.sign(&master(), &leaf::positions(&lv, 0), b"m");
        assert!(verify(&pk, b"m", &sig));
        pk[3] = 2;
        assert!(!verify(&pk, b"m", &sig));
        assert!(!verify(&pk[..10], b"m", &sig));
        assert!(!verify(&h.public_key(), b"m", &sig[..3]));
    }
}
