// Leaf index bookkeeping
//
// The private key counter is a single global index over all bottom-level
// leaves. Split into per-level parts it gives, for every level, the tree
// in use and the leaf of that tree.

use crate::hss::config::Level;
use crate::hss::error::HssError;

/// Active tree and leaf at one level for a given counter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafPosition {
    /// Index of the tree among all trees of its level
    pub tree_index: u64,
    /// Leaf within that tree
    pub leaf: u32,
}

fn shr(value: u64, shift: u32) -> u64 {
    value.checked_shr(shift).unwrap_or(0)
}

/// Total number of leaves, `2^(sum of heights)`, saturating at `u64::MAX`.
pub fn capacity(levels: &[Level]) -> u64 {
    let total: u32 = levels.iter().map(Level::height).sum();
    if total >= u64::BITS {
        u64::MAX
    } else {
        1u64 << total
    }
}

/// Split `counter` into one position per level, top level first.
pub fn positions(levels: &[Level], counter: u64) -> Vec<LeafPosition> {
    let mut below: u32 = levels.iter().map(Level::height).sum();
    levels
        .iter()
        .map(|level| {
            let h = level.height();
            below -= h;
            let mask = (1u64 << h) - 1;
            LeafPosition {
                tree_index: shr(counter, below + h),
                leaf: (shr(counter, below) & mask) as u32,
            }
        })
        .collect()
}

/// Validate that a leaf is left for the next signature
///
/// Preconditions:
/// - `counter` is the next unused leaf index
///
/// Postconditions:
/// - Ok if `counter < capacity`
/// - Err(KeyExhausted) otherwise; no leaf index is handed out twice
pub fn ensure_available(counter: u64, capacity: u64) -> Result<(), HssError> {
    if counter >= capacity {
        return Err(HssError::KeyExhausted { issued: counter });
    }
    Ok(())
}

/// Validate a counter read back from storage
///
/// A counter equal to the capacity is an exhausted key, anything larger
/// cannot have been written by this code.
pub fn validate_counter(counter: u64, capacity: u64) -> Result<(), HssError> {
    if counter > capacity {
        return Err(HssError::CorruptState {
            reason: format!("counter {} exceeds capacity {}", counter, capacity),
        });
    }
    Ok(())
}
