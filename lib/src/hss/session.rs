// Incremental sign and verify sessions
//
// Both sessions absorb the message in arbitrary chunks and act on its
// SHA-256 digest at `finalize`. A session is single use: once finalized
// (or failed) every further call is `InvalidState`.

use tracing::debug;

use crate::engine;
use crate::hss::error::HssError;
use crate::hss::lifecycle::WorkingKey;
use crate::hss::message::MessageDigest;
use crate::hss::store::KeyStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Accumulating,
    Finalized,
    Failed,
}

impl SessionState {
    fn accepts_input(self) -> bool {
        matches!(self, SessionState::Init | SessionState::Accumulating)
    }
}

fn reuse_error(state: SessionState) -> HssError {
    HssError::InvalidState(format!("session already {:?}", state).to_lowercase())
}

/// Signs one message with the next leaf of a working key
pub struct SignSession<'a> {
    key: &'a mut WorkingKey,
    store: &'a dyn KeyStore,
    digest: MessageDigest,
    state: SessionState,
}

impl<'a> SignSession<'a> {
    /// Bind a working key. No leaf is consumed until `finalize`.
    pub fn init(key: &'a mut WorkingKey, store: &'a dyn KeyStore) -> Result<Self, HssError> {
        if key.is_poisoned() {
            return Err(HssError::InvalidState(format!(
                "key '{}' must be reloaded after a failed state write",
                key.id()
            )));
        }
        Ok(Self {
            key,
            store,
            digest: MessageDigest::new(),
            state: SessionState::Init,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn update(&mut self, chunk: &[u8]) -> Result<(), HssError> {
        if !self.state.accepts_input() {
            return Err(reuse_error(self.state));
        }
        self.digest.update(chunk);
        self.state = SessionState::Accumulating;
        Ok(())
    }

    /// Sign the accumulated message
    ///
    /// Postconditions:
    /// - On Ok, the key state with the used leaf marked has been stored
    /// - On any error the session is Failed and no signature exists
    pub fn finalize(&mut self) -> Result<Vec<u8>, HssError> {
        if !self.state.accepts_input() {
            return Err(reuse_error(self.state));
        }
        let digest = std::mem::take(&mut self.digest);
        let message_len = digest.len();
        match self.key.sign_digest(self.store, &digest.finalize()) {
            Ok(signature) => {
                self.state = SessionState::Finalized;
                debug!(id = self.key.id(), message_len, "signed message");
                Ok(signature)
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }
}

/// Checks one detached signature against a public key
pub struct VerifySession<'a> {
    public_key: &'a [u8],
    signature: &'a [u8],
    digest: MessageDigest,
    state: SessionState,
}

impl<'a> VerifySession<'a> {
    pub fn init(public_key: &'a [u8], signature: &'a [u8]) -> Self {
        Self {
            public_key,
            signature,
            digest: MessageDigest::new(),
            state: SessionState::Init,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn update(&mut self, chunk: &[u8]) -> Result<(), HssError> {
        if !self.state.accepts_input() {
            return Err(reuse_error(self.state));
        }
        self.digest.update(chunk);
        self.state = SessionState::Accumulating;
        Ok(())
    }

    /// `Ok(false)` for any signature that does not verify, malformed ones
    /// included.
    pub fn finalize(&mut self) -> Result<bool, HssError> {
        if !self.state.accepts_input() {
            return Err(reuse_error(self.state));
        }
        let digest = std::mem::take(&mut self.digest).finalize();
        self.state = SessionState::Finalized;
        Ok(engine::verify(self.public_key, &digest, self.signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hss::config::ParameterSet;
    use crate::hss::entropy::{EntropyAggregator, RngEntropy};
    use crate::hss::lifecycle::{AuxPolicy, KeyManager};
    use crate::hss::store::MemoryKeyStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup(params: &str) -> (KeyManager<MemoryKeyStore>, Vec<u8>) {
        let km = KeyManager::new(MemoryKeyStore::new());
        let mut entropy = EntropyAggregator::new()
            .with_source(RngEntropy::new("a", StdRng::seed_from_u64(11)))
            .with_source(RngEntropy::new("b", StdRng::seed_from_u64(12)));
        let params: ParameterSet = params.parse().unwrap();
        let generated = km.generate("k", &params, &mut entropy).unwrap();
        (km, generated.public_key)
    }

    #[test]
    fn test_sign_then_verify() {
        let (km, pk) = setup("5/4:0");
        let mut key = km.load("k", None, AuxPolicy::Fallback).unwrap();

        let mut session = SignSession::init(&mut key, km.store()).unwrap();
        assert_eq!(session.state(), SessionState::Init);
        session.update(b"hello").unwrap();
        assert_eq!(session.state(), SessionState::Accumulating);
        let signature = session.finalize().unwrap();
        assert_eq!(session.state(), SessionState::Finalized);

        let mut verify = VerifySession::init(&pk, &signature);
        verify.update(b"hel").unwrap();
        verify.update(b"lo").unwrap();
        assert!(verify.finalize().unwrap());

        let mut verify = VerifySession::init(&pk, &signature);
        verify.update(b"hellO").unwrap();
        assert!(!verify.finalize().unwrap());
    }

    #[test]
    fn test_empty_message_can_be_signed() {
        let (km, pk) = setup("5/8:0");
        let mut key = km.load("k", None, AuxPolicy::Fallback).unwrap();
        let signature = SignSession::init(&mut key, km.store()).unwrap().finalize().unwrap();
        assert!(VerifySession::init(&pk, &signature).finalize().unwrap());
    }

    #[test]
    fn test_sessions_are_single_use() {
        let (km, pk) = setup("5/4:0");
        let mut key = km.load("k", None, AuxPolicy::Fallback).unwrap();

        let mut session = SignSession::init(&mut key, km.store()).unwrap();
        let signature = session.finalize().unwrap();
        assert!(matches!(session.update(b"x"), Err(HssError::InvalidState(_))));
        assert!(matches!(session.finalize(), Err(HssError::InvalidState(_))));

        let mut verify = VerifySession::init(&pk, &signature);
        verify.finalize().unwrap();
        assert!(matches!(verify.finalize(), Err(HssError::InvalidState(_))));
        assert!(matches!(verify.update(b"x"), Err(HssError::InvalidState(_))));
    }

    #[test]
    fn test_store_failure_withholds_signature() {
        let (km, _) = setup("5/4:0");
        let mut key = km.load("k", None, AuxPolicy::Fallback).unwrap();
        let before = km.store().snapshot("k").unwrap();

        km.store().fail_next_write();
        let mut session = SignSession::init(&mut key, km.store()).unwrap();
        session.update(b"message").unwrap();
        assert!(matches!(session.finalize(), Err(HssError::Persistence(_))));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(km.store().snapshot("k").unwrap(), before, "stored state unchanged");

        assert!(matches!(SignSession::init(&mut key, km.store()), Err(HssError::InvalidState(_))));
    }

    #[test]
    fn test_malformed_signature_is_false() {
        let (_, pk) = setup("5/4:0");
        for bogus in [&b""[..], &b"short"[..], &[0u8; 2000][..]] {
            let mut verify = VerifySession::init(&pk, bogus);
            verify.update(b"m").unwrap();
            assert_eq!(verify.finalize().unwrap(), false);
        }
    }
}
