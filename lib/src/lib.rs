mod engine;
pub mod hss;

// Re-export main types
pub use hss::{
    AuxPolicy, EntropyAggregator, FileKeyStore, HssError, KeyManager, KeyStore, MemoryKeyStore,
    ParameterSet, SignSession, VerifySession,
};
