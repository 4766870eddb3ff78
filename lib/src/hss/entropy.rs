// Entropy aggregation for key generation
//
// Every configured source contributes a 32-byte sample to a pool; output
// is produced in 32-byte chunks, chunk i = SHA-256(pool || u32 i).

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, error};
use zeroize::{Zeroize, Zeroizing};

/// Bytes drawn from each source per request
const SAMPLE_LEN: usize = 32;

/// Smallest number of sources accepted
pub const MIN_SOURCES: usize = 2;

#[derive(Debug, Error)]
pub enum EntropyError {
    #[error("at least {MIN_SOURCES} entropy sources are required, {available} configured")]
    TooFewSources { available: usize },

    #[error("entropy source '{name}' failed: {reason}")]
    SourceFailed { name: String, reason: String },
}

/// Anything that can fill a buffer with unpredictable bytes
pub trait EntropySource {
    fn name(&self) -> &str;

    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError>;
}

/// Adapter from a `rand` generator to an entropy source.
pub struct RngEntropy<R> {
    name: String,
    rng: R,
}

impl<R: RngCore> RngEntropy<R> {
    pub fn new(name: impl Into<String>, rng: R) -> Self {
        Self {
            name: name.into(),
            rng,
        }
    }
}

impl<R: RngCore> EntropySource for RngEntropy<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        self.rng
            .try_fill_bytes(dest)
            .map_err(|e| EntropyError::SourceFailed {
                name: self.name.clone(),
                reason: e.to_string(),
            })
    }
}

/// Mixes several independent sources through SHA-256
#[derive(Default)]
pub struct EntropyAggregator {
    sources: Vec<Box<dyn EntropySource>>,
}

impl EntropyAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The operating system RNG plus the thread-local CSPRNG.
    pub fn system() -> Self {
        Self::new()
            .with_source(RngEntropy::new("os", OsRng))
            .with_source(RngEntropy::new("thread", rand::thread_rng()))
    }

    pub fn with_source(mut self, source: impl EntropySource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Produce `length` bytes
    ///
    /// Postconditions:
    /// - Returns exactly `length` bytes, or an error if fewer than
    ///   MIN_SOURCES sources exist or any source fails
    /// - Raw samples are scrubbed before return on every path
    pub fn generate(&mut self, length: usize) -> Result<Zeroizing<Vec<u8>>, EntropyError> {
        if self.sources.len() < MIN_SOURCES {
            error!(available = self.sources.len(), "not enough entropy sources");
            return Err(EntropyError::TooFewSources {
                available: self.sources.len(),
            });
        }

        let mut pool = Zeroizing::new(vec![0u8; SAMPLE_LEN * self.sources.len()]);
        for (source, sample) in self.sources.iter_mut().zip(pool.chunks_exact_mut(SAMPLE_LEN)) {
            source.fill(sample)?;
            debug!(source = source.name(), "sampled entropy source");
        }

        let mut out = Zeroizing::new(Vec::with_capacity(length));
        let mut counter: u32 = 0;
        while out.len() < length {
            let mut hasher = Sha256::new();
            hasher.update(&pool[..]);
            hasher.update(counter.to_be_bytes());
            let mut chunk: [u8; 32] = hasher.finalize().into();
            let take = (length - out.len()).min(chunk.len());
            out.extend_from_slice(&chunk[..take]);
            chunk.zeroize();
            counter = counter.wrapping_add(1);
        }
        Ok(out)
    }
}

impl EntropySource for EntropyAggregator {
    fn name(&self) -> &str {
        "aggregate"
    }

    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        let bytes = self.generate(dest.len())?;
        dest.copy_from_slice(&bytes);
        Ok(())
    }
}
