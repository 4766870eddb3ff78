// LMS one-level Merkle signatures (RFC 8554 section 5)

use super::hash::{read_u32, sha256, Identifier, Node, D_INTR, D_LEAF};
use super::lmots;
use hss_types::{LmotsAlgorithm, LmsAlgorithm, Typecode, HASH_LEN, ID_LEN};

/// `u32 lms type || u32 ots type || I || T[1]`.
pub const PUBLIC_KEY_LEN: usize = 4 + 4 + ID_LEN + HASH_LEN;

pub fn leaf_hash(id: &Identifier, r: u32, ots_public_key: &Node) -> Node {
    sha256(&[id, &r.to_be_bytes(), &D_LEAF.to_be_bytes(), ots_public_key])
}

pub fn interior_hash(id: &Identifier, r: u32, left: &Node, right: &Node) -> Node {
    sha256(&[id, &r.to_be_bytes(), &D_INTR.to_be_bytes(), left, right])
}

pub fn public_key(lms: LmsAlgorithm, ots: LmotsAlgorithm, id: &Identifier, root: &Node) -> Vec<u8> {
    let mut out = Vec::with_capacity(PUBLIC_KEY_LEN);
    out.extend_from_slice(&lms.typecode().to_be_bytes());
    out.extend_from_slice(&ots.typecode().to_be_bytes());
    out.extend_from_slice(id);
    out.extend_from_slice(root);
    out
}

/// `u32 q || lmots_signature || u32 lms type || path[0..h]`.
pub fn signature_len(lms: LmsAlgorithm, ots: LmotsAlgorithm) -> usize {
    4 + lmots::signature_len(ots) + 4 + lms.height() as usize * HASH_LEN
}

/// Length of the LMS signature at the start of `bytes`, read from the
/// typecodes it carries.
pub fn signature_len_prefix(bytes: &[u8]) -> Option<usize> {
    let ots = LmotsAlgorithm::from_typecode(read_u32(bytes, 4)?)?;
    let lms = LmsAlgorithm::from_typecode(read_u32(bytes, 4 + lmots::signature_len(ots))?)?;
    Some(signature_len(lms, ots))
}

/// Assemble an LMS signature from its parts.
pub fn encode_signature(lms: LmsAlgorithm, q: u32, ots_signature: &[u8], path: &[Node]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + ots_signature.len() + path.len() * HASH_LEN);
    out.extend_from_slice(&q.to_be_bytes());
    out.extend_from_slice(ots_signature);
    out.extend_from_slice(&lms.typecode().to_be_bytes());
    for node in path {
        out.extend_from_slice(node);
    }
    out
}

/// Verify an LMS signature; any structural problem is a plain `false`.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    verify_inner(public_key, message, signature).unwrap_or(false)
}

fn verify_inner(public_key: &[u8], message: &[u8], signature: &[u8]) -> Option<bool> {
    if public_key.len() != PUBLIC_KEY_LEN {
        return Some(false);
    }
    let lms = LmsAlgorithm::from_typecode(read_u32(public_key, 0)?)?;
    let ots = LmotsAlgorithm::from_typecode(read_u32(public_key, 4)?)?;
    let mut id = [0u8; ID_LEN];
    id.copy_from_slice(&public_key[8..8 + ID_LEN]);
    let root = &public_key[8 + ID_LEN..];

    let h = lms.height();
    let ots_len = lmots::signature_len(ots);
    if signature.len() != signature_len(lms, ots) {
        return Some(false);
    }
    let q = read_u32(signature, 0)?;
    if read_u32(signature, 4 + ots_len)? != lms.typecode() || q >= (1u32 << h) {
        return Some(false);
    }

    let candidate = lmots::candidate_public_key(ots, &id, q, message, &signature[4..4 + ots_len])?;

    let mut node_num = (1u32 << h) + q;
    let mut tmp = leaf_hash(&id, node_num, &candidate);
    for sibling in signature[8 + ots_len..].chunks_exact(HASH_LEN) {
        let mut path_node = [0u8; HASH_LEN];
        path_node.copy_from_slice(sibling);
        tmp = if node_num & 1 == 1 {
            interior_hash(&id, node_num / 2, &path_node, &tmp)
        } else {
            interior_hash(&id, node_num / 2, &tmp, &path_node)
        };
        node_num /= 2;
    }
    Some(tmp[..] == root[..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_length_matches_rfc_layout() {
        // LMS_SHA256_M32_H5 with LMOTS_SHA256_N32_W8: 4 + 1124 + 4 + 5*32.
        let len = signature_len(LmsAlgorithm::LMS_SHA256_M32_H5, LmotsAlgorithm::LMOTS_SHA256_N32_W8);
        assert_eq!(len, 1292);
    }

    #[test]
    fn test_signature_len_prefix_reads_typecodes() {
        let lms = LmsAlgorithm::LMS_SHA256_M32_H10;
        let ots = LmotsAlgorithm::LMOTS_SHA256_N32_W4;
        let fake = encode_signature(lms, 0, &{
            let mut ots_sig = vec![0u8; lmots::signature_len(ots)];
            ots_sig[..4].copy_from_slice(&ots.typecode().to_be_bytes());
            ots_sig
        }, &vec![[0u8; HASH_LEN]; 10]);
        assert_eq!(signature_len_prefix(&fake), Some(signature_len(lms, ots)));
        assert_eq!(signature_len_prefix(&fake[..6]), None);
    }

    #[test]
    fn test_verify_rejects_short_public_key() {
        assert!(!verify(&[0u8; 10], b"m", &[0u8; 100]));
    }
}
