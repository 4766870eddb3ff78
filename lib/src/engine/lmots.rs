// LM-OTS one-time signatures (RFC 8554 section 4)

use super::hash::{derive, read_u32, sha256, Identifier, Node, D_MESG, D_PBLC, D_RANDOMIZER};
use hss_types::{LmotsAlgorithm, Typecode, HASH_LEN};
use zeroize::Zeroize;

/// Byte length of an LM-OTS signature: `u32 type || C || y[0..p]`.
pub fn signature_len(ots: LmotsAlgorithm) -> usize {
    4 + HASH_LEN + ots.chains() * HASH_LEN
}

/// Iterate chain `i` of leaf `q` from step `from` up to (excluding) `to`.
fn chain(id: &Identifier, q: u32, i: u16, from: u32, to: u32, mut tmp: Node) -> Node {
    let q_bytes = q.to_be_bytes();
    let i_bytes = i.to_be_bytes();
    for j in from..to {
        tmp = sha256(&[id, &q_bytes, &i_bytes, &[j as u8], &tmp]);
    }
    tmp
}

/// `Q || Cksm(Q)` split into `p` base-2^w digits.
fn digits(ots: LmotsAlgorithm, q_hash: &Node) -> Vec<u32> {
    let w = ots.width();
    let per_byte = (8 / w) as usize;
    let mask = ots.max_digit();

    let coef = |bytes: &[u8], i: usize| -> u32 {
        let byte = bytes[i / per_byte] as u32;
        let shift = 8 - (w * (i % per_byte) as u32 + w);
        (byte >> shift) & mask
    };

    let message_digits = HASH_LEN * per_byte;
    let checksum: u32 = (0..message_digits)
        .map(|i| mask - coef(&q_hash[..], i))
        .sum::<u32>()
        << ots.checksum_shift();

    let mut extended = [0u8; HASH_LEN + 2];
    extended[..HASH_LEN].copy_from_slice(q_hash);
    extended[HASH_LEN..].copy_from_slice(&(checksum as u16).to_be_bytes());

    (0..ots.chains()).map(|i| coef(&extended[..], i)).collect()
}

fn message_hash(id: &Identifier, q: u32, randomizer: &Node, message: &[u8]) -> Node {
    sha256(&[id, &q.to_be_bytes(), &D_MESG.to_be_bytes(), randomizer, message])
}

/// Public key `K` of leaf `q`.
pub fn public_key(ots: LmotsAlgorithm, seed: &Node, id: &Identifier, q: u32) -> Node {
    let top = ots.max_digit();
    let mut ends = Vec::with_capacity(ots.chains() * HASH_LEN);
    for i in 0..ots.chains() as u16 {
        let mut x = derive(seed, id, q, i);
        ends.extend_from_slice(&chain(id, q, i, 0, top, x));
        x.zeroize();
    }
    sha256(&[id, &q.to_be_bytes(), &D_PBLC.to_be_bytes(), &ends])
}

/// Sign `message` with the one-time key of leaf `q`.
///
/// The randomizer `C` is derived from the seed, which keeps signing
/// deterministic for a given leaf and message.
pub fn sign(ots: LmotsAlgorithm, seed: &Node, id: &Identifier, q: u32, message: &[u8]) -> Vec<u8> {
    let randomizer = derive(seed, id, q, D_RANDOMIZER);
    let q_hash = message_hash(id, q, &randomizer, message);

    let mut out = Vec::with_capacity(signature_len(ots));
    out.extend_from_slice(&ots.typecode().to_be_bytes());
    out.extend_from_slice(&randomizer);
    for (i, digit) in digits(ots, &q_hash).into_iter().enumerate() {
        let mut x = derive(seed, id, q, i as u16);
        out.extend_from_slice(&chain(id, q, i as u16, 0, digit, x));
        x.zeroize();
    }
    out
}

/// Candidate public key `Kc` recovered from a signature, or `None` if the
/// signature is malformed or of a different algorithm.
pub fn candidate_public_key(
    ots: LmotsAlgorithm,
    id: &Identifier,
    q: u32,
    message: &[u8],
    signature: &[u8],
) -> Option<Node> {
    if signature.len() != signature_len(ots) || read_u32(signature, 0)? != ots.typecode() {
        return None;
    }
    let mut randomizer = [0u8; HASH_LEN];
    randomizer.copy_from_slice(&signature[4..4 + HASH_LEN]);
    let q_hash = message_hash(id, q, &randomizer, message);

    let top = ots.max_digit();
    let mut ends = Vec::with_capacity(ots.chains() * HASH_LEN);
    for (i, (digit, y)) in digits(ots, &q_hash)
        .into_iter()
        .zip(signature[4 + HASH_LEN..].chunks_exact(HASH_LEN))
        .enumerate()
    {
        let mut tmp = [0u8; HASH_LEN];
        tmp.copy_from_slice(y);
        ends.extend_from_slice(&chain(id, q, i as u16, digit, top, tmp));
    }
    Some(sha256(&[id, &q.to_be_bytes(), &D_PBLC.to_be_bytes(), &ends]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hss_types::ID_LEN;

    const SEED: Node = [0x5a; HASH_LEN];
    const ID: Identifier = [0x11; ID_LEN];

    #[test]
    fn test_signature_recovers_public_key() {
        for ots in LmotsAlgorithm::ALL {
            let pk = public_key(ots, &SEED, &ID, 3);
            let sig = sign(ots, &SEED, &ID, 3, b"digest");
            assert_eq!(sig.len(), signature_len(ots));
            assert_eq!(candidate_public_key(ots, &ID, 3, b"digest", &sig), Some(pk), "{:?}", ots);
        }
    }

    #[test]
    fn test_wrong_message_or_leaf_changes_candidate() {
        let ots = LmotsAlgorithm::LMOTS_SHA256_N32_W4;
        let pk = public_key(ots, &SEED, &ID, 0);
        let sig = sign(ots, &SEED, &ID, 0, b"digest");
        assert_ne!(candidate_public_key(ots, &ID, 0, b"digesT", &sig), Some(pk));
        assert_ne!(candidate_public_key(ots, &ID, 1, b"digest", &sig), Some(pk));
    }

    #[test]
    fn test_malformed_signatures_are_rejected() {
        let ots = LmotsAlgorithm::LMOTS_SHA256_N32_W2;
        let sig = sign(ots, &SEED, &ID, 0, b"m");
        assert!(candidate_public_key(ots, &ID, 0, b"m", &sig[..sig.len() - 1]).is_none());
        assert!(candidate_public_key(LmotsAlgorithm::LMOTS_SHA256_N32_W4, &ID, 0, b"m", &sig).is_none());
    }

    #[test]
    fn test_checksum_digits_fit_the_extended_digest() {
        // An all-zero digest maximizes the checksum.
        for ots in LmotsAlgorithm::ALL {
            let d = digits(ots, &[0u8; HASH_LEN]);
            assert_eq!(d.len(), ots.chains());
            assert!(d.iter().all(|&x| x <= ots.max_digit()));
            assert!(d[HASH_LEN * 8 / ots.width() as usize..].iter().any(|&x| x != 0));
        }
    }

    #[test]
    fn test_signing_is_deterministic() {
        let ots = LmotsAlgorithm::LMOTS_SHA256_N32_W8;
        assert_eq!(sign(ots, &SEED, &ID, 9, b"abc"), sign(ots, &SEED, &ID, 9, b"abc"));
    }
}
