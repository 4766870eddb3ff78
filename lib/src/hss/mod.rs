// Stateful HSS key lifecycle
//
// Parameter sets, key persistence, entropy aggregation and the streaming
// sign/verify sessions built on top of the signature engine.

pub mod config;
pub mod entropy;
pub mod error;
pub mod lifecycle;
pub mod message;
pub mod session;
pub mod store;

pub(crate) mod aux;
pub(crate) mod leaf;
pub(crate) mod state;

pub use config::{Level, ParameterError, ParameterSet};
pub use entropy::{EntropyAggregator, EntropyError, EntropySource, RngEntropy};
pub use error::HssError;
pub use lifecycle::{AuxPolicy, AuxStatus, GeneratedKey, KeyManager, KeyStatus, WorkingKey};
pub use message::MessageDigest;
pub use session::{SessionState, SignSession, VerifySession};
pub use store::{FileKeyStore, KeyLock, KeyStore, MemoryKeyStore, StoreError};
