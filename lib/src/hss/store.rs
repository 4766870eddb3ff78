// Private key persistence
//
// The lifecycle layer only talks to the `KeyStore` trait. A store must make
// `store` atomic from the caller's view: after a failed write the previous
// blob is still what `load` returns.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fs2::FileExt;
use thiserror::Error;
use tracing::{debug, warn};

/// Private key state file
pub const PRIVATE_EXT: &str = "prv";
/// Public key file
pub const PUBLIC_EXT: &str = "pub";
/// Accelerator cache file
pub const AUX_EXT: &str = "aux";
/// Advisory lock file
pub const LOCK_EXT: &str = "lock";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no stored state for key '{id}'")]
    NotFound { id: String },

    #[error("key '{id}' is in use{}", .holder.map(|pid| format!(" by process {}", pid)).unwrap_or_default())]
    Locked { id: String, holder: Option<u32> },

    #[error("invalid key name '{id}'")]
    InvalidId { id: String },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failure produced on purpose by `MemoryKeyStore`
    #[error("injected write failure")]
    Injected,
}

/// Exclusive use of one key, held until dropped
pub struct KeyLock {
    id: String,
    guard: LockGuard,
}

enum LockGuard {
    File(File),
    Memory(Arc<Mutex<HashSet<String>>>),
}

impl KeyLock {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        match &self.guard {
            LockGuard::File(file) => {
                if let Err(e) = file.unlock() {
                    warn!(id = %self.id, error = %e, "failed to release key lock");
                }
            }
            LockGuard::Memory(held) => {
                relock(held).remove(&self.id);
            }
        }
        debug!(id = %self.id, "released key lock");
    }
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Storage backend for private key state blobs
pub trait KeyStore {
    /// Current blob of `id`, or `NotFound`.
    fn load(&self, id: &str) -> Result<Vec<u8>, StoreError>;

    /// Replace the blob of `id`. Either the whole new blob is durable when
    /// this returns Ok, or the old blob is unchanged.
    fn store(&self, id: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Take the single-writer lock of `id` without blocking.
    fn lock(&self, id: &str) -> Result<KeyLock, StoreError>;
}

/// Key names become file names; keep them to one path component.
fn check_id(id: &str) -> Result<(), StoreError> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(|c: char| c == '/' || c == '\\' || c == '\0');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidId { id: id.to_string() })
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Keys stored as files in one directory
///
/// `<id>.prv` holds the state; it is replaced by writing `<id>.prv.tmp`,
/// syncing it, renaming it over the old file and syncing the directory.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    dir: PathBuf,
}

impl FileKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file with `extension` belonging to key `id`.
    pub fn artifact_path(&self, id: &str, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, extension))
    }

    /// Write any key artifact with the same replace-and-sync sequence used
    /// for private state.
    pub fn write_artifact(&self, id: &str, extension: &str, bytes: &[u8]) -> Result<(), StoreError> {
        check_id(id)?;
        let path = self.artifact_path(id, extension);
        let tmp = self.artifact_path(id, &format!("{}.tmp", extension));

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)
            .map_err(io_error(&tmp))?;
        file.write_all(bytes).map_err(io_error(&tmp))?;
        file.sync_all().map_err(io_error(&tmp))?;
        drop(file);

        fs::rename(&tmp, &path).map_err(io_error(&path))?;
        self.sync_dir()
    }

    /// Read a key artifact; a missing file is `NotFound`.
    pub fn read_artifact(&self, id: &str, extension: &str) -> Result<Vec<u8>, StoreError> {
        check_id(id)?;
        let path = self.artifact_path(id, extension);
        fs::read(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound { id: id.to_string() }
            } else {
                StoreError::Io { path, source }
            }
        })
    }

    #[cfg(unix)]
    fn sync_dir(&self) -> Result<(), StoreError> {
        let dir = if self.dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            self.dir.as_path()
        };
        File::open(dir)
            .and_then(|d| d.sync_all())
            .map_err(io_error(dir))
    }

    #[cfg(not(unix))]
    fn sync_dir(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn read_holder(path: &Path) -> Option<u32> {
        let mut contents = String::new();
        File::open(path).ok()?.read_to_string(&mut contents).ok()?;
        contents.trim().parse().ok()
    }
}

impl KeyStore for FileKeyStore {
    fn load(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        self.read_artifact(id, PRIVATE_EXT)
    }

    fn store(&self, id: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.write_artifact(id, PRIVATE_EXT, bytes)?;
        debug!(id, len = bytes.len(), "persisted private key state");
        Ok(())
    }

    fn lock(&self, id: &str) -> Result<KeyLock, StoreError> {
        check_id(id)?;
        let path = self.artifact_path(id, LOCK_EXT);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(io_error(&path))?;

        if file.try_lock_exclusive().is_err() {
            let holder = Self::read_holder(&path);
            warn!(id, ?holder, "key is locked by another user");
            return Err(StoreError::Locked {
                id: id.to_string(),
                holder,
            });
        }

        file.set_len(0).map_err(io_error(&path))?;
        writeln!(file, "{}", std::process::id()).map_err(io_error(&path))?;
        file.sync_all().map_err(io_error(&path))?;
        debug!(id, "acquired key lock");
        Ok(KeyLock {
            id: id.to_string(),
            guard: LockGuard::File(file),
        })
    }
}

#[derive(Debug, Default)]
struct Faults {
    /// Successful writes left before the next injected failure
    fail_after: Option<usize>,
}

/// Keys kept in memory, with write-fault injection for tests
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    locks: Arc<Mutex<HashSet<String>>>,
    faults: Mutex<Faults>,
    writes: Mutex<usize>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `store` call fail.
    pub fn fail_next_write(&self) {
        self.fail_after(0);
    }

    /// Let `successes` more writes through, then fail one.
    pub fn fail_after(&self, successes: usize) {
        relock(&self.faults).fail_after = Some(successes);
    }

    /// Copy of the stored blob of `id`.
    pub fn snapshot(&self, id: &str) -> Option<Vec<u8>> {
        relock(&self.blobs).get(id).cloned()
    }

    /// Put a blob in place directly, bypassing fault injection.
    pub fn insert(&self, id: &str, bytes: Vec<u8>) {
        relock(&self.blobs).insert(id.to_string(), bytes);
    }

    /// Number of successful `store` calls.
    pub fn writes(&self) -> usize {
        *relock(&self.writes)
    }
}

impl KeyStore for MemoryKeyStore {
    fn load(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        self.snapshot(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    fn store(&self, id: &str, bytes: &[u8]) -> Result<(), StoreError> {
        {
            let mut faults = relock(&self.faults);
            match faults.fail_after {
                Some(0) => {
                    faults.fail_after = None;
                    return Err(StoreError::Injected);
                }
                Some(n) => faults.fail_after = Some(n - 1),
                None => {}
            }
        }
        self.insert(id, bytes.to_vec());
        *relock(&self.writes) += 1;
        Ok(())
    }

    fn lock(&self, id: &str) -> Result<KeyLock, StoreError> {
        if !relock(&self.locks).insert(id.to_string()) {
            return Err(StoreError::Locked {
                id: id.to_string(),
                holder: Some(std::process::id()),
            });
        }
        Ok(KeyLock {
            id: id.to_string(),
            guard: LockGuard::Memory(Arc::clone(&self.locks)),
        })
    }
}
