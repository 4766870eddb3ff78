// Error types for the key lifecycle layer

use thiserror::Error;

use crate::hss::config::ParameterError;
use crate::hss::entropy::EntropyError;
use crate::hss::store::StoreError;

#[derive(Debug, Error)]
pub enum HssError {
    /// Parameter string or level layout rejected
    #[error("Invalid parameter set: {0}")]
    Parameter(#[from] ParameterError),

    /// Not enough usable entropy to create a key
    #[error("Entropy failure: {0}")]
    Entropy(#[from] EntropyError),

    /// Private key state could not be read or written
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("Key '{id}' not found")]
    NotFound { id: String },

    /// Stored private key blob is not a valid key state
    #[error("Corrupt private key state: {reason}")]
    CorruptState { reason: String },

    /// Accelerator cache does not belong to the key
    #[error("Accelerator cache rejected: {reason}")]
    AuxMismatch { reason: String },

    /// Every one-time leaf has been issued
    #[error("Key exhausted after {issued} signatures")]
    KeyExhausted { issued: u64 },

    /// Signing engine could not produce a result
    #[error("Signature engine error: {0}")]
    Engine(String),

    /// Operation not permitted in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}
