// `verify` subcommand

use std::fs;
use std::path::PathBuf;

use hss_lib::hss::store::PUBLIC_EXT;
use hss_lib::{FileKeyStore, VerifySession};

use crate::commands::{signature_path, stream_file, BatchReport, CommandResult, Outcome};
use crate::config::Settings;

/// Check `<file>.sig` for every file against the public key of `name`.
pub fn handle_verify(settings: &Settings, name: &str, files: &[PathBuf]) -> CommandResult {
    let store = FileKeyStore::new(&settings.key_dir);
    let public_key = store.read_artifact(name, PUBLIC_EXT)?;
    let mut report = BatchReport::default();

    for path in files {
        let sig_path = signature_path(path);
        let signature = match fs::read(&sig_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                report.fail(&sig_path, e);
                continue;
            }
        };

        let mut session = VerifySession::init(&public_key, &signature);
        if let Err(e) = stream_file(path, settings.chunk_size, |chunk| session.update(chunk)) {
            report.fail(path, e);
            continue;
        }
        if session.finalize()? {
            println!("Signature on {} is valid", path.display());
            report.succeed(path);
        } else {
            println!("Signature on {} is NOT valid", path.display());
            report.mismatch(path);
        }
    }
    Ok(Outcome::Batch(report))
}
