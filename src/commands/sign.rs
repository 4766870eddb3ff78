// `sign` subcommand

use std::fs;
use std::path::PathBuf;

use hss_lib::hss::store::{StoreError, AUX_EXT};
use hss_lib::{AuxPolicy, FileKeyStore, HssError, KeyManager, SignSession};
use tracing::warn;

use crate::commands::{signature_path, stream_file, BatchReport, CommandResult, Outcome};
use crate::config::Settings;

/// Sign every file with one leaf each, writing `<file>.sig`
///
/// Unreadable files are reported and skipped without consuming a leaf.
/// A failure to persist the key state stops the batch.
pub fn handle_sign(settings: &Settings, name: &str, files: &[PathBuf]) -> CommandResult {
    let store = FileKeyStore::new(&settings.key_dir);
    let aux = match store.read_artifact(name, AUX_EXT) {
        Ok(bytes) => Some(bytes),
        Err(StoreError::NotFound { .. }) => None,
        Err(e) => {
            warn!(name, error = %e, "aux data unreadable, loading without it");
            None
        }
    };

    let manager = KeyManager::new(store);
    let mut key = manager.load(name, aux.as_deref(), AuxPolicy::Fallback)?;
    let mut report = BatchReport::default();

    for path in files {
        let mut session = SignSession::init(&mut key, manager.store())?;
        if let Err(e) = stream_file(path, settings.chunk_size, |chunk| session.update(chunk)) {
            report.fail(path, e);
            continue;
        }

        let signature = match session.finalize() {
            Ok(signature) => signature,
            Err(e) => {
                if matches!(e, HssError::KeyExhausted { .. }) {
                    println!("Key '{}' has no signatures left", name);
                }
                println!("Stopping after {} signed file(s)", report.succeeded.len());
                return Err(e.into());
            }
        };

        let sig_path = signature_path(path);
        match fs::write(&sig_path, &signature) {
            Ok(()) => {
                println!("Signed {} -> {}", path.display(), sig_path.display());
                report.succeed(path);
            }
            Err(e) => report.fail(&sig_path, e),
        }
    }

    println!(
        "{} signature(s) remaining for key '{}'",
        key.remaining(),
        name
    );
    manager.release(key);
    Ok(Outcome::Batch(report))
}
