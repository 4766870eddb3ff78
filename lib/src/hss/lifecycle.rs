// Key lifecycle: generation, loading, inspection and release
//
// `KeyManager` binds a `KeyStore` to the signature engine. A loaded
// `WorkingKey` owns the store's lock for its whole lifetime, which is what
// keeps a key to a single writer.

use serde::Serialize;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::engine::{self, default_split, Hierarchy, MasterSecret, MerkleTree};
use crate::hss::aux;
use crate::hss::config::{format_levels, Level, ParameterSet};
use crate::hss::entropy::EntropySource;
use crate::hss::error::HssError;
use crate::hss::leaf;
use crate::hss::state::PrivateKeyState;
use crate::hss::store::{KeyLock, KeyStore, StoreError};
use hss_types::{HASH_LEN, ID_LEN};

/// What to do with an accelerator cache that fails authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuxPolicy {
    /// Log the mismatch and rebuild the top tree from the seed
    #[default]
    Fallback,
    /// Refuse to load the key
    Strict,
}

/// How the top tree of a working key was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuxStatus {
    NotSupplied,
    Used,
    Rejected,
}

/// Result of key generation
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    pub public_key: Vec<u8>,
    /// Accelerator cache, if the parameter set allows one
    pub aux: Option<Vec<u8>>,
}

/// Report on a stored key, produced without locking it
#[derive(Debug, Clone, Serialize)]
pub struct KeyStatus {
    pub id: String,
    pub levels: String,
    pub total_height: u32,
    pub capacity: u64,
    pub signatures_issued: u64,
    pub remaining: u64,
    pub exhausted: bool,
    pub public_key_len: usize,
    pub signature_len: usize,
    pub private_key_len: usize,
}

/// Loaded private key ready for signing sessions
///
/// Holds the key's lock until dropped; secrets are scrubbed on drop.
pub struct WorkingKey {
    id: String,
    levels: Vec<Level>,
    master: MasterSecret,
    counter: u64,
    capacity: u64,
    public_key: Vec<u8>,
    /// Absent once the key is exhausted
    signer: Option<Hierarchy>,
    poisoned: bool,
    aux_status: AuxStatus,
    _lock: KeyLock,
}

impl WorkingKey {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Signatures issued so far, i.e. the next leaf index.
    pub fn signatures_issued(&self) -> u64 {
        self.counter
    }

    pub fn remaining(&self) -> u64 {
        self.capacity - self.counter
    }

    pub fn signature_len(&self) -> usize {
        engine::signature_len(&self.levels)
    }

    pub fn aux_status(&self) -> AuxStatus {
        self.aux_status
    }

    /// True after a failed state write; the key must be reloaded.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Sign a message digest with the next unused leaf
    ///
    /// Preconditions:
    /// - the key is not poisoned
    ///
    /// Postconditions:
    /// - On Ok, the advanced counter is durable in `store` before the
    ///   signature is returned
    /// - On a store failure the signature is dropped and the key poisoned
    ///
    /// Invariants:
    /// - A leaf index is never used for two signatures
    pub(crate) fn sign_digest(&mut self, store: &dyn KeyStore, digest: &[u8]) -> Result<Vec<u8>, HssError> {
        if self.poisoned {
            return Err(HssError::InvalidState(format!(
                "key '{}' failed to persist its state and must be reloaded",
                self.id
            )));
        }
        leaf::ensure_available(self.counter, self.capacity)?;

        let positions = leaf::positions(&self.levels, self.counter);
        let signer = self
            .signer
            .as_mut()
            .ok_or_else(|| HssError::Engine("no signing trees loaded".to_string()))?;
        let signature = signer.sign(&self.master, &positions, digest);

        let next = PrivateKeyState {
            counter: self.counter + 1,
            levels: self.levels.clone(),
            master: self.master.clone(),
        };
        if let Err(e) = store.store(&self.id, &next.encode()) {
            self.poisoned = true;
            error!(id = %self.id, leaf = self.counter, error = %e, "state write failed, signature withheld");
            return Err(e.into());
        }

        self.counter += 1;
        if self.counter == self.capacity {
            self.signer = None;
            warn!(id = %self.id, "last signature issued, key is exhausted");
        }
        debug!(id = %self.id, leaf = self.counter - 1, "issued signature");
        Ok(signature)
    }
}

/// Generates, loads and inspects keys kept in a `KeyStore`
pub struct KeyManager<S: KeyStore> {
    store: S,
}

impl<S: KeyStore> KeyManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Generate a new key and persist its initial state
    ///
    /// Preconditions:
    /// - no key named `id` exists in the store
    ///
    /// Postconditions:
    /// - The public key is only returned once state with counter 0 has
    ///   been stored
    /// - The top tree is built in parallel; the result does not depend on
    ///   scheduling
    pub fn generate(
        &self,
        id: &str,
        params: &ParameterSet,
        entropy: &mut dyn EntropySource,
    ) -> Result<GeneratedKey, HssError> {
        let _lock = self.store.lock(id)?;
        match self.store.load(id) {
            Ok(_) => {
                return Err(HssError::InvalidState(format!("key '{}' already exists", id)));
            }
            Err(StoreError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let mut material = Zeroizing::new([0u8; HASH_LEN + ID_LEN]);
        entropy.fill(&mut material[..])?;
        let mut master = MasterSecret {
            seed: [0u8; HASH_LEN],
            id: [0u8; ID_LEN],
        };
        master.seed.copy_from_slice(&material[..HASH_LEN]);
        master.id.copy_from_slice(&material[HASH_LEN..]);

        let levels = params.levels();
        let top_level = levels[0];
        let split = aux::stored_height(top_level.height(), params.aux_budget())
            .unwrap_or_else(|| default_split(top_level.height()));
        info!(id, parameters = %params, "generating key");
        let top = MerkleTree::build(
            top_level.lms,
            top_level.ots,
            engine::tree_secret(&master, 0, 0),
            split,
        );

        let public_key = engine::public_key_from_top(levels.len(), &top);
        let aux = aux::export(&master, levels, &top, params.aux_budget())?;

        let state = PrivateKeyState {
            counter: 0,
            levels: levels.to_vec(),
            master,
        };
        self.store.store(id, &state.encode())?;
        info!(id, aux_len = aux.as_ref().map_or(0, Vec::len), "key generated");

        Ok(GeneratedKey { public_key, aux })
    }

    /// Load a key for signing
    ///
    /// A supplied accelerator cache is authenticated against the key;
    /// under `AuxPolicy::Fallback` a rejected cache is ignored and the top
    /// tree is recomputed.
    pub fn load(&self, id: &str, aux_data: Option<&[u8]>, policy: AuxPolicy) -> Result<WorkingKey, HssError> {
        let lock = self.store.lock(id)?;
        let blob = Zeroizing::new(self.store.load(id).map_err(|e| match e {
            StoreError::NotFound { id } => HssError::NotFound { id },
            other => HssError::Persistence(other),
        })?);
        let PrivateKeyState {
            counter,
            levels,
            master,
        } = PrivateKeyState::decode(&blob)?;

        let top_level = levels[0];
        let secret = engine::tree_secret(&master, 0, 0);
        let (cached, aux_status) = match aux_data {
            None => (None, AuxStatus::NotSupplied),
            Some(bytes) => match aux::import(&master, &levels, bytes) {
                Ok((height, nodes)) => {
                    let tree = MerkleTree::from_nodes(top_level.lms, top_level.ots, secret.clone(), height, &nodes)
                        .ok_or_else(|| HssError::AuxMismatch {
                            reason: "node count does not match the top tree".to_string(),
                        })?;
                    (Some(tree), AuxStatus::Used)
                }
                Err(e) if policy == AuxPolicy::Strict => return Err(e),
                Err(e) => {
                    warn!(id, error = %e, "ignoring accelerator cache");
                    (None, AuxStatus::Rejected)
                }
            },
        };
        let top = match cached {
            Some(tree) => tree,
            None => {
                debug!(id, "rebuilding top tree from seed");
                MerkleTree::build(top_level.lms, top_level.ots, secret, default_split(top_level.height()))
            }
        };

        let capacity = leaf::capacity(&levels);
        let public_key = engine::public_key_from_top(levels.len(), &top);
        let signer = if counter < capacity {
            let positions = leaf::positions(&levels, counter);
            Some(Hierarchy::assemble(&master, &levels, &positions, top))
        } else {
            warn!(id, "loaded an exhausted key");
            None
        };
        info!(id, issued = counter, remaining = capacity - counter, aux = ?aux_status, "key loaded");

        Ok(WorkingKey {
            id: id.to_string(),
            levels,
            master,
            counter,
            capacity,
            public_key,
            signer,
            poisoned: false,
            aux_status,
            _lock: lock,
        })
    }

    /// End the use of a working key; its lock is released and its secrets
    /// scrubbed.
    pub fn release(&self, key: WorkingKey) {
        debug!(id = %key.id, issued = key.counter, "releasing working key");
        drop(key);
    }

    /// Status of a stored key without building trees or taking its lock.
    pub fn inspect(&self, id: &str) -> Result<KeyStatus, HssError> {
        let blob = Zeroizing::new(self.store.load(id).map_err(|e| match e {
            StoreError::NotFound { id } => HssError::NotFound { id },
            other => HssError::Persistence(other),
        })?);
        let state = PrivateKeyState::decode(&blob)?;
        let capacity = leaf::capacity(&state.levels);
        Ok(KeyStatus {
            id: id.to_string(),
            levels: format_levels(&state.levels),
            total_height: state.levels.iter().map(Level::height).sum(),
            capacity,
            signatures_issued: state.counter,
            remaining: capacity - state.counter,
            exhausted: state.counter == capacity,
            public_key_len: engine::public_key_len(),
            signature_len: engine::signature_len(&state.levels),
            private_key_len: blob.len(),
        })
    }
}
