#![cfg_attr(not(feature = "std"), no_std)]

//! RFC 8554 algorithm identifiers shared by the signer and the verifier.
//!
//! Only the SHA-256/n=32 family is represented; the typecodes are the
//! values carried on the wire in public keys and signatures.

use serde::{Deserialize, Serialize};

/// Output length of the hash function, in bytes.
pub const HASH_LEN: usize = 32;

/// Length of the key pair identifier `I`.
pub const ID_LEN: usize = 16;

/// Maximum number of Merkle levels in a hierarchy.
pub const MAX_LEVELS: usize = 8;

/// Anything that is identified by an `lms_algorithm_type` or
/// `lmots_algorithm_type` on the wire.
pub trait Typecode: Sized {
    /// Wire value of the algorithm type.
    fn typecode(&self) -> u32;

    /// Inverse of [`Typecode::typecode`].
    fn from_typecode(code: u32) -> Option<Self>;
}

/// LMS tree algorithms (SHA-256, m = 32).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum LmsAlgorithm {
    LMS_SHA256_M32_H5,
    LMS_SHA256_M32_H10,
    LMS_SHA256_M32_H15,
    LMS_SHA256_M32_H20,
    LMS_SHA256_M32_H25,
}

impl LmsAlgorithm {
    /// Every supported tree algorithm, lowest height first.
    pub const ALL: [LmsAlgorithm; 5] = [
        LmsAlgorithm::LMS_SHA256_M32_H5,
        LmsAlgorithm::LMS_SHA256_M32_H10,
        LmsAlgorithm::LMS_SHA256_M32_H15,
        LmsAlgorithm::LMS_SHA256_M32_H20,
        LmsAlgorithm::LMS_SHA256_M32_H25,
    ];

    /// Tree height `h`; the tree has `2^h` leaves.
    pub const fn height(&self) -> u32 {
        match self {
            LmsAlgorithm::LMS_SHA256_M32_H5 => 5,
            LmsAlgorithm::LMS_SHA256_M32_H10 => 10,
            LmsAlgorithm::LMS_SHA256_M32_H15 => 15,
            LmsAlgorithm::LMS_SHA256_M32_H20 => 20,
            LmsAlgorithm::LMS_SHA256_M32_H25 => 25,
        }
    }

    pub fn from_height(height: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.height() == height)
    }
}

impl Typecode for LmsAlgorithm {
    fn typecode(&self) -> u32 {
        match self {
            LmsAlgorithm::LMS_SHA256_M32_H5 => 0x0000_0005,
            LmsAlgorithm::LMS_SHA256_M32_H10 => 0x0000_0006,
            LmsAlgorithm::LMS_SHA256_M32_H15 => 0x0000_0007,
            LmsAlgorithm::LMS_SHA256_M32_H20 => 0x0000_0008,
            LmsAlgorithm::LMS_SHA256_M32_H25 => 0x0000_0009,
        }
    }

    fn from_typecode(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.typecode() == code)
    }
}

/// LM-OTS algorithms (SHA-256, n = 32).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum LmotsAlgorithm {
    LMOTS_SHA256_N32_W1,
    LMOTS_SHA256_N32_W2,
    LMOTS_SHA256_N32_W4,
    LMOTS_SHA256_N32_W8,
}

impl LmotsAlgorithm {
    /// Every supported one-time signature algorithm, narrowest first.
    pub const ALL: [LmotsAlgorithm; 4] = [
        LmotsAlgorithm::LMOTS_SHA256_N32_W1,
        LmotsAlgorithm::LMOTS_SHA256_N32_W2,
        LmotsAlgorithm::LMOTS_SHA256_N32_W4,
        LmotsAlgorithm::LMOTS_SHA256_N32_W8,
    ];

    /// Winternitz parameter `w` (bits per chain digit).
    pub const fn width(&self) -> u32 {
        match self {
            LmotsAlgorithm::LMOTS_SHA256_N32_W1 => 1,
            LmotsAlgorithm::LMOTS_SHA256_N32_W2 => 2,
            LmotsAlgorithm::LMOTS_SHA256_N32_W4 => 4,
            LmotsAlgorithm::LMOTS_SHA256_N32_W8 => 8,
        }
    }

    /// Number of hash chains `p` (message digits plus checksum digits).
    pub const fn chains(&self) -> usize {
        match self {
            LmotsAlgorithm::LMOTS_SHA256_N32_W1 => 265,
            LmotsAlgorithm::LMOTS_SHA256_N32_W2 => 133,
            LmotsAlgorithm::LMOTS_SHA256_N32_W4 => 67,
            LmotsAlgorithm::LMOTS_SHA256_N32_W8 => 34,
        }
    }

    /// Left shift `ls` applied to the checksum.
    pub const fn checksum_shift(&self) -> u32 {
        match self {
            LmotsAlgorithm::LMOTS_SHA256_N32_W1 => 7,
            LmotsAlgorithm::LMOTS_SHA256_N32_W2 => 6,
            LmotsAlgorithm::LMOTS_SHA256_N32_W4 => 4,
            LmotsAlgorithm::LMOTS_SHA256_N32_W8 => 0,
        }
    }

    /// Largest chain digit, `2^w - 1`.
    pub const fn max_digit(&self) -> u32 {
        (1 << self.width()) - 1
    }

    pub fn from_width(width: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.width() == width)
    }
}

impl Typecode for LmotsAlgorithm {
    fn typecode(&self) -> u32 {
        match self {
            LmotsAlgorithm::LMOTS_SHA256_N32_W1 => 0x0000_0001,
            LmotsAlgorithm::LMOTS_SHA256_N32_W2 => 0x0000_0002,
            LmotsAlgorithm::LMOTS_SHA256_N32_W4 => 0x0000_0003,
            LmotsAlgorithm::LMOTS_SHA256_N32_W8 => 0x0000_0004,
        }
    }

    fn from_typecode(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.typecode() == code)
    }
}
