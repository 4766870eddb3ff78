// Subcommand handlers and per-file batch reporting

use std::error::Error;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use hss_lib::HssError;

pub mod genkey;
pub mod info;
pub mod sign;
pub mod verify;

pub use genkey::handle_genkey;
pub use info::handle_info;
pub use sign::handle_sign;
pub use verify::handle_verify;

pub type CommandResult = Result<Outcome, Box<dyn Error>>;

/// Process exit status
pub const EXIT_OK: u8 = 0;
pub const EXIT_FATAL: u8 = 1;
pub const EXIT_FILE_ERRORS: u8 = 2;
pub const EXIT_MISMATCH: u8 = 3;

/// Per-file results of a `sign` or `verify` batch
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub mismatched: Vec<PathBuf>,
}

impl BatchReport {
    pub fn succeed(&mut self, path: &Path) {
        self.succeeded.push(path.to_path_buf());
    }

    pub fn fail(&mut self, path: &Path, error: impl ToString) {
        let message = error.to_string();
        eprintln!("Error processing {}: {}", path.display(), message);
        self.failed.push((path.to_path_buf(), message));
    }

    pub fn mismatch(&mut self, path: &Path) {
        self.mismatched.push(path.to_path_buf());
    }

    /// Mismatches outrank I/O failures.
    pub fn exit_code(&self) -> u8 {
        if !self.mismatched.is_empty() {
            EXIT_MISMATCH
        } else if !self.failed.is_empty() {
            EXIT_FILE_ERRORS
        } else {
            EXIT_OK
        }
    }
}

/// What a successful command run produced
#[derive(Debug)]
pub enum Outcome {
    Done,
    Batch(BatchReport),
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Done => EXIT_OK,
            Outcome::Batch(report) => report.exit_code(),
        }
    }
}

/// Path of the detached signature for `path`: the file name plus `.sig`.
pub fn signature_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".sig");
    PathBuf::from(name)
}

/// Feed a file to `feed` in pieces of at most `chunk_size` bytes.
pub(crate) fn stream_file(
    path: &Path,
    chunk_size: usize,
    mut feed: impl FnMut(&[u8]) -> Result<(), HssError>,
) -> Result<(), Box<dyn Error>> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        feed(&buf[..n])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_path_appends_suffix() {
        assert_eq!(signature_path(Path::new("a/b.txt")), PathBuf::from("a/b.txt.sig"));
        assert_eq!(signature_path(Path::new("plain")), PathBuf::from("plain.sig"));
    }

    #[test]
    fn test_exit_codes() {
        let mut report = BatchReport::default();
        assert_eq!(report.exit_code(), EXIT_OK);
        report.fail(Path::new("x"), "missing");
        assert_eq!(report.exit_code(), EXIT_FILE_ERRORS);
        report.mismatch(Path::new("y"));
        assert_eq!(Outcome::Batch(report).exit_code(), EXIT_MISMATCH);
        assert_eq!(Outcome::Done.exit_code(), EXIT_OK);
    }
}
