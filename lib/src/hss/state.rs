// Private key state encoding
//
// Layout (64 bytes):
//   counter   u64 big endian, next unused leaf index
//   levels    8 bytes, one `(lms << 4) | ots` code per level, zero padded
//   seed      32 bytes
//   I         16 bytes

use hss_types::{HASH_LEN, ID_LEN, MAX_LEVELS};
use zeroize::Zeroizing;

use crate::engine::MasterSecret;
use crate::hss::config::Level;
use crate::hss::error::HssError;
use crate::hss::leaf;

pub const STATE_LEN: usize = 8 + MAX_LEVELS + HASH_LEN + ID_LEN;

const LEVELS_AT: usize = 8;
const SEED_AT: usize = LEVELS_AT + MAX_LEVELS;
const ID_AT: usize = SEED_AT + HASH_LEN;

fn corrupt(reason: impl Into<String>) -> HssError {
    HssError::CorruptState {
        reason: reason.into(),
    }
}

/// Decoded private key blob
pub struct PrivateKeyState {
    pub counter: u64,
    pub levels: Vec<Level>,
    pub master: MasterSecret,
}

impl PrivateKeyState {
    /// Serialize to the fixed layout; the buffer is scrubbed when dropped.
    pub fn encode(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(vec![0u8; STATE_LEN]);
        out[..LEVELS_AT].copy_from_slice(&self.counter.to_be_bytes());
        for (slot, level) in out[LEVELS_AT..SEED_AT].iter_mut().zip(&self.levels) {
            *slot = level.code();
        }
        out[SEED_AT..ID_AT].copy_from_slice(&self.master.seed);
        out[ID_AT..].copy_from_slice(&self.master.id);
        out
    }

    /// Parse and validate a stored blob
    ///
    /// Postconditions:
    /// - Err(CorruptState) unless the blob has the exact length, 1 to 8
    ///   valid level codes followed only by zero padding, and a counter no
    ///   larger than the capacity of those levels
    pub fn decode(bytes: &[u8]) -> Result<Self, HssError> {
        if bytes.len() != STATE_LEN {
            return Err(corrupt(format!(
                "expected {} bytes, found {}",
                STATE_LEN,
                bytes.len()
            )));
        }

        let mut counter_bytes = [0u8; 8];
        counter_bytes.copy_from_slice(&bytes[..LEVELS_AT]);
        let counter = u64::from_be_bytes(counter_bytes);

        let codes = &bytes[LEVELS_AT..SEED_AT];
        let used = codes.iter().position(|&c| c == 0).unwrap_or(MAX_LEVELS);
        if used == 0 {
            return Err(corrupt("no levels recorded"));
        }
        if codes[used..].iter().any(|&c| c != 0) {
            return Err(corrupt("level codes are not contiguous"));
        }
        let levels = codes[..used]
            .iter()
            .map(|&code| {
                Level::from_code(code).ok_or_else(|| corrupt(format!("unknown level code {:#04x}", code)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        leaf::validate_counter(counter, leaf::capacity(&levels))?;

        let mut master = MasterSecret {
            seed: [0u8; HASH_LEN],
            id: [0u8; ID_LEN],
        };
        master.seed.copy_from_slice(&bytes[SEED_AT..ID_AT]);
        master.id.copy_from_slice(&bytes[ID_AT..]);

        Ok(Self {
            counter,
            levels,
            master,
        })
    }
}
