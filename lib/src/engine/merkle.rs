// Merkle tree with a bounded node cache
//
// A tree of height h is split at height s. Nodes at height >= s (the "top",
// 2^(h-s+1) - 1 nodes) stay resident; nodes below s are only kept for the
// one subtree that contains the leaf currently being signed, and are
// recomputed when signing moves into the next subtree. Node numbering
// follows RFC 8554: the root is 1 and node r has children 2r and 2r+1, so
// the resident top part is exactly the heap prefix of the whole tree.

use super::hash::{Identifier, Node};
use super::{lmots, lms};
use hss_types::{LmotsAlgorithm, LmsAlgorithm, HASH_LEN};
use rayon::prelude::*;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secret material of a single LMS tree.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TreeSecret {
    pub seed: Node,
    pub id: Identifier,
}

struct Subtree {
    /// Node number of the subtree root (at height `split`).
    root: u32,
    /// Heap-ordered nodes, index 1 is `root`.
    nodes: Vec<Node>,
}

pub struct MerkleTree {
    lms: LmsAlgorithm,
    ots: LmotsAlgorithm,
    secret: TreeSecret,
    split: u32,
    top: Vec<Node>,
    subtree: Option<Subtree>,
}

/// Split height used when nothing better is known: the resident top and
/// the recomputed subtree have roughly the same size.
pub fn default_split(height: u32) -> u32 {
    (height + 1) / 2
}

/// Node number of heap index `local` in a subtree rooted at `root`.
fn global_node(root: u32, local: u32) -> u32 {
    let depth = 31 - local.leading_zeros();
    (root << depth) + (local - (1 << depth))
}

impl MerkleTree {
    /// Compute the whole tree. Leaves are independent and are generated on
    /// the rayon pool; the resulting nodes do not depend on scheduling.
    pub fn build(lms: LmsAlgorithm, ots: LmotsAlgorithm, secret: TreeSecret, split: u32) -> Self {
        let h = lms.height();
        let split = split.min(h);
        let count = 1u32 << (h - split);
        let mut tree = Self::empty(lms, ots, secret, split);

        let roots: Vec<Node> = (0..count)
            .into_par_iter()
            .map(|j| tree.subtree_nodes(count + j)[1])
            .collect();
        tree.top[count as usize..].copy_from_slice(&roots);
        tree.fill_top(count);
        tree
    }

    /// Rebuild the resident top part from the nodes at height `split`,
    /// as stored in an accelerator cache.
    pub fn from_nodes(
        lms: LmsAlgorithm,
        ots: LmotsAlgorithm,
        secret: TreeSecret,
        split: u32,
        nodes: &[Node],
    ) -> Option<Self> {
        let h = lms.height();
        if split > h || nodes.len() != 1usize << (h - split) {
            return None;
        }
        let count = 1u32 << (h - split);
        let mut tree = Self::empty(lms, ots, secret, split);
        tree.top[count as usize..].copy_from_slice(nodes);
        tree.fill_top(count);
        Some(tree)
    }

    fn empty(lms: LmsAlgorithm, ots: LmotsAlgorithm, secret: TreeSecret, split: u32) -> Self {
        let count = 1usize << (lms.height() - split);
        Self {
            lms,
            ots,
            secret,
            split,
            top: vec![[0u8; HASH_LEN]; 2 * count],
            subtree: None,
        }
    }

    fn fill_top(&mut self, count: u32) {
        for r in (1..count).rev() {
            let (left, right) = (self.top[2 * r as usize], self.top[2 * r as usize + 1]);
            self.top[r as usize] = lms::interior_hash(&self.secret.id, r, &left, &right);
        }
    }

    /// All nodes of the subtree of height `split` rooted at node `root`.
    fn subtree_nodes(&self, root: u32) -> Vec<Node> {
        let h = self.lms.height();
        let width = 1u32 << self.split;
        let first_leaf = root << self.split;

        let mut nodes = vec![[0u8; HASH_LEN]; 2 * width as usize];
        let leaves: Vec<Node> = (0..width)
            .into_par_iter()
            .map(|j| {
                let r = first_leaf + j;
                let q = r - (1 << h);
                let k = lmots::public_key(self.ots, &self.secret.seed, &self.secret.id, q);
                lms::leaf_hash(&self.secret.id, r, &k)
            })
            .collect();
        nodes[width as usize..].copy_from_slice(&leaves);

        for local in (1..width).rev() {
            let (left, right) = (nodes[2 * local as usize], nodes[2 * local as usize + 1]);
            nodes[local as usize] =
                lms::interior_hash(&self.secret.id, global_node(root, local), &left, &right);
        }
        nodes
    }

    pub fn root(&self) -> Node {
        self.top[1]
    }

    /// Resident nodes at height `height`, left to right.
    pub fn nodes_at(&self, height: u32) -> Option<&[Node]> {
        let h = self.lms.height();
        if height < self.split || height > h {
            return None;
        }
        let start = 1usize << (h - height);
        Some(&self.top[start..2 * start])
    }

    pub fn public_key(&self) -> Vec<u8> {
        lms::public_key(self.lms, self.ots, &self.secret.id, &self.root())
    }

    /// Authentication path of leaf `q`, loading its subtree if needed.
    fn auth_path(&mut self, q: u32) -> Vec<Node> {
        let h = self.lms.height();
        let leaf = (1u32 << h) + q;
        let root = leaf >> self.split;

        let subtree = match self.subtree.take() {
            Some(cached) if cached.root == root => cached,
            _ => Subtree { root, nodes: self.subtree_nodes(root) },
        };

        let mut path = Vec::with_capacity(h as usize);
        for i in 0..h {
            let sibling = (leaf >> i) ^ 1;
            if i < self.split {
                let depth = self.split - i;
                let local = sibling - (root << depth) + (1 << depth);
                path.push(subtree.nodes[local as usize]);
            } else {
                path.push(self.top[sibling as usize]);
            }
        }
        self.subtree = Some(subtree);
        path
    }

    /// LMS signature of `message` with leaf `q`.
    pub fn sign(&mut self, q: u32, message: &[u8]) -> Vec<u8> {
        let path = self.auth_path(q);
        let ots_signature = lmots::sign(self.ots, &self.secret.seed, &self.secret.id, q, message);
        lms::encode_signature(self.lms, q, &ots_signature, &path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hss_types::ID_LEN;

    fn secret() -> TreeSecret {
        TreeSecret { seed: [0x42; HASH_LEN], id: [0x24; ID_LEN] }
    }

    const LMS: LmsAlgorithm = LmsAlgorithm::LMS_SHA256_M32_H5;
    const OTS: LmotsAlgorithm = LmotsAlgorithm::LMOTS_SHA256_N32_W1;

    #[test]
    fn test_global_node_numbers_subtree_positions() {
        assert_eq!(global_node(5, 1), 5);
        assert_eq!(global_node(5, 2), 10);
        assert_eq!(global_node(5, 3), 11);
        assert_eq!(global_node(5, 7), 23);
    }

    #[test]
    fn test_root_does_not_depend_on_split() {
        let reference = MerkleTree::build(LMS, OTS, secret(), 0).root();
        for split in 1..=5 {
            assert_eq!(MerkleTree::build(LMS, OTS, secret(), split).root(), reference);
        }
    }

    #[test]
    fn test_every_leaf_signature_verifies() {
        let mut tree = MerkleTree::build(LMS, OTS, secret(), 2);
        let pk = tree.public_key();
        for q in 0..32 {
            let sig = tree.sign(q, b"digest");
            assert!(lms::verify(&pk, b"digest", &sig), "leaf {}", q);
            assert!(!lms::verify(&pk, b"other", &sig), "leaf {}", q);
        }
    }

    #[test]
    fn test_rebuilding_from_cached_nodes_signs_identically() {
        let mut full = MerkleTree::build(LMS, OTS, secret(), 3);
        let cached = full.nodes_at(3).unwrap().to_vec();
        let mut restored = MerkleTree::from_nodes(LMS, OTS, secret(), 3, &cached).unwrap();
        assert_eq!(restored.root(), full.root());
        assert_eq!(restored.sign(17, b"m"), full.sign(17, b"m"));
        assert!(MerkleTree::from_nodes(LMS, OTS, secret(), 2, &cached).is_none());
    }
}
