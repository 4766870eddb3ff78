// Accelerator cache ("aux data")
//
// Layout: height (u8) || 2^(h0 - height) top-tree nodes at that height ||
// HMAC-SHA256 tag. The tag key is derived from the private seed and the tag
// also covers the level codes, so a cache from another key or another
// parameter set is rejected instead of trusted.

use hmac::{Hmac, Mac};
use hss_types::{HASH_LEN, MAX_LEVELS};
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroize;

use crate::engine::{self, MasterSecret, MerkleTree, Node};
use crate::hss::config::Level;
use crate::hss::error::HssError;

type HmacSha256 = Hmac<Sha256>;

const TAG_LEN: usize = 32;

/// Byte length of a cache storing the nodes at `height` of a top tree of
/// height `top_height`.
pub fn encoded_len(top_height: u32, height: u32) -> usize {
    1 + (1usize << (top_height - height)) * HASH_LEN + TAG_LEN
}

/// Lowest height whose encoding fits in `budget`, or `None` if the cache
/// is disabled or nothing fits.
pub fn stored_height(top_height: u32, budget: usize) -> Option<u32> {
    if budget == 0 {
        return None;
    }
    (0..top_height).find(|&height| encoded_len(top_height, height) <= budget)
}

fn mismatch(reason: impl Into<String>) -> HssError {
    HssError::AuxMismatch {
        reason: reason.into(),
    }
}

fn tagger(master: &MasterSecret, levels: &[Level], height: u8) -> Result<HmacSha256, HssError> {
    let mut key = engine::aux_key(master);
    let mac = HmacSha256::new_from_slice(&key);
    key.zeroize();
    let mut mac = mac.map_err(|e| HssError::Engine(format!("aux tag key: {}", e)))?;

    let mut codes = [0u8; MAX_LEVELS];
    for (slot, level) in codes.iter_mut().zip(levels) {
        *slot = level.code();
    }
    mac.update(&codes);
    mac.update(&[height]);
    Ok(mac)
}

/// Cache for a freshly built top tree, or `None` when the budget does not
/// allow one. The tree must have been built with a split at or below the
/// stored height.
pub fn export(
    master: &MasterSecret,
    levels: &[Level],
    top: &MerkleTree,
    budget: usize,
) -> Result<Option<Vec<u8>>, HssError> {
    let top_height = levels[0].height();
    let Some(height) = stored_height(top_height, budget) else {
        return Ok(None);
    };
    let nodes = top
        .nodes_at(height)
        .ok_or_else(|| HssError::Engine(format!("top tree holds no nodes at height {}", height)))?;

    let mut out = Vec::with_capacity(encoded_len(top_height, height));
    out.push(height as u8);
    for node in nodes {
        out.extend_from_slice(node);
    }
    let mut mac = tagger(master, levels, height as u8)?;
    mac.update(&out[1..]);
    out.extend_from_slice(&mac.finalize().into_bytes());
    debug!(height, len = out.len(), "exported accelerator cache");
    Ok(Some(out))
}

/// Authenticated contents of a cache: the height and its nodes.
pub fn import(master: &MasterSecret, levels: &[Level], bytes: &[u8]) -> Result<(u32, Vec<Node>), HssError> {
    let top_height = levels[0].height();
    let (&height, _) = bytes.split_first().ok_or_else(|| mismatch("empty cache"))?;
    if u32::from(height) >= top_height {
        return Err(mismatch(format!("height {} outside top tree", height)));
    }
    let expected = encoded_len(top_height, u32::from(height));
    if bytes.len() != expected {
        return Err(mismatch(format!(
            "expected {} bytes for height {}, found {}",
            expected,
            height,
            bytes.len()
        )));
    }

    let (body, tag) = bytes[1..].split_at(bytes.len() - 1 - TAG_LEN);
    let mut mac = tagger(master, levels, height)?;
    mac.update(body);
    mac.verify_slice(tag)
        .map_err(|_| mismatch("authentication tag does not match this key"))?;

    let nodes = body
        .chunks_exact(HASH_LEN)
        .map(|chunk| {
            let mut node = [0u8; HASH_LEN];
            node.copy_from_slice(chunk);
            node
        })
        .collect();
    Ok((u32::from(height), nodes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tree_secret;
    use hss_types::ID_LEN;

    fn master(byte: u8) -> MasterSecret {
        MasterSecret {
            seed: [byte; HASH_LEN],
            id: [byte ^ 0xff; ID_LEN],
        }
    }

    fn top(master: &MasterSecret, level: Level, split: u32) -> MerkleTree {
        MerkleTree::build(level.lms, level.ots, tree_secret(master, 0, 0), split)
    }

    #[test]
    fn test_stored_height_for_default_budget() {
        assert_eq!(stored_height(20, 8740), Some(12));
        assert_eq!(encoded_len(20, 12), 1 + 256 * 32 + 32);
        assert_eq!(stored_height(20, 0), None);
        assert_eq!(stored_height(20, 64), None, "nothing fits");
        assert_eq!(stored_height(5, 8740), Some(0));
    }

    #[test]
    fn test_export_import() {
        let m = master(1);
        let levels = vec![Level::new(5, 8).unwrap()];
        let budget = encoded_len(5, 2);
        let tree = top(&m, levels[0], 2);

        let aux = export(&m, &levels, &tree, budget).unwrap().unwrap();
        assert_eq!(aux.len(), budget);
        let (height, nodes) = import(&m, &levels, &aux).unwrap();
        assert_eq!(height, 2);
        assert_eq!(nodes, tree.nodes_at(2).unwrap());
    }

    #[test]
    fn test_foreign_or_damaged_cache_is_rejected() {
        let m = master(1);
        let levels = vec![Level::new(5, 8).unwrap()];
        let tree = top(&m, levels[0], 2);
        let aux = export(&m, &levels, &tree, encoded_len(5, 2)).unwrap().unwrap();

        assert!(matches!(import(&master(2), &levels, &aux), Err(HssError::AuxMismatch { .. })));

        let other_levels = vec![Level::new(5, 4).unwrap()];
        assert!(import(&m, &other_levels, &aux).is_err(), "tag covers the level codes");

        let mut flipped = aux.clone();
        flipped[10] ^= 1;
        assert!(import(&m, &levels, &flipped).is_err());

        assert!(import(&m, &levels, &aux[..aux.len() - 1]).is_err());
        assert!(import(&m, &levels, &[]).is_err());

        let mut wrong_height = aux.clone();
        wrong_height[0] = 9;
        assert!(import(&m, &levels, &wrong_height).is_err());
    }

    #[test]
    fn test_export_without_budget() {
        let m = master(3);
        let levels = vec![Level::new(5, 8).unwrap()];
        let tree = top(&m, levels[0], 3);
        assert!(export(&m, &levels, &tree, 0).unwrap().is_none());
    }
}
