use std::fs;
use std::path::PathBuf;

use hss_keytool::commands::{
    self, genkey::handle_genkey_with, signature_path, EXIT_FILE_ERRORS, EXIT_MISMATCH, EXIT_OK,
};
use hss_keytool::config::Settings;
use hss_lib::hss::entropy::RngEntropy;
use hss_lib::EntropyAggregator;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

fn settings(dir: &TempDir, chunk_size: usize) -> Settings {
    Settings {
        key_dir: dir.path().join("keys"),
        chunk_size,
    }
}

fn entropy() -> EntropyAggregator {
    EntropyAggregator::new()
        .with_source(RngEntropy::new("a", StdRng::seed_from_u64(21)))
        .with_source(RngEntropy::new("b", StdRng::seed_from_u64(22)))
}

fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_genkey_writes_key_files() {
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir, 1024);
    handle_genkey_with(&settings, "alpha", Some("5/8"), &mut entropy()).unwrap();

    let keys = &settings.key_dir;
    assert_eq!(fs::read(keys.join("alpha.prv")).unwrap().len(), 64);
    assert_eq!(fs::read(keys.join("alpha.pub")).unwrap().len(), 60);
    assert!(keys.join("alpha.aux").exists(), "default budget writes aux data");
}

#[test]
fn test_genkey_rejects_bad_parameters_before_touching_disk() {
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir, 1024);
    let err = handle_genkey_with(&settings, "alpha", Some("12/4"), &mut entropy()).unwrap_err();
    assert!(err.to_string().contains("unsupported Merkle tree height 12"));
    assert!(!settings.key_dir.join("alpha.prv").exists());
}

#[test]
fn test_genkey_discards_private_key_when_public_key_write_fails() {
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir, 1024);
    let blocker = settings.key_dir.join("alpha.pub.tmp");
    fs::create_dir_all(&blocker).unwrap();

    assert!(handle_genkey_with(&settings, "alpha", Some("5/8:0"), &mut entropy()).is_err());
    assert!(!settings.key_dir.join("alpha.prv").exists());
    assert!(!settings.key_dir.join("alpha.pub").exists());

    fs::remove_dir(&blocker).unwrap();
    handle_genkey_with(&settings, "alpha", Some("5/8:0"), &mut entropy()).unwrap();
    assert!(settings.key_dir.join("alpha.pub").exists());
}

#[test]
fn test_sign_and_verify_round_trip() {
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir, 3);
    handle_genkey_with(&settings, "k", Some("10/4:0"), &mut entropy()).unwrap();
    assert!(!settings.key_dir.join("k.aux").exists());

    let hello = write_file(&dir, "hello.txt", b"hello");
    let outcome = commands::handle_sign(&settings, "k", &[hello.clone()]).unwrap();
    assert_eq!(outcome.exit_code(), EXIT_OK);
    assert!(signature_path(&hello).exists());

    let outcome = commands::handle_verify(&settings, "k", &[hello.clone()]).unwrap();
    assert_eq!(outcome.exit_code(), EXIT_OK);

    let sig_path = signature_path(&hello);
    let mut signature = fs::read(&sig_path).unwrap();
    signature[100] ^= 0xff;
    fs::write(&sig_path, &signature).unwrap();
    let outcome = commands::handle_verify(&settings, "k", &[hello]).unwrap();
    assert_eq!(outcome.exit_code(), EXIT_MISMATCH);
}

#[test]
fn test_missing_files_are_skipped() {
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir, 1024);
    handle_genkey_with(&settings, "k", Some("5/4:0"), &mut entropy()).unwrap();

    let present = write_file(&dir, "present.bin", &[7u8; 5000]);
    let missing = dir.path().join("missing.bin");
    let outcome = commands::handle_sign(&settings, "k", &[missing.clone(), present.clone()]).unwrap();
    assert_eq!(outcome.exit_code(), EXIT_FILE_ERRORS);
    assert!(signature_path(&present).exists(), "later files are still signed");

    let outcome = commands::handle_verify(&settings, "k", &[present, missing]).unwrap();
    assert_eq!(outcome.exit_code(), EXIT_FILE_ERRORS);

    let status = hss_lib::KeyManager::new(hss_lib::FileKeyStore::new(&settings.key_dir))
        .inspect("k")
        .unwrap();
    assert_eq!(status.signatures_issued, 1, "unreadable file consumed no leaf");
}

#[test]
fn test_each_file_gets_its_own_leaf() {
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir, 64);
    handle_genkey_with(&settings, "k", Some("5/2:0"), &mut entropy()).unwrap();

    let a = write_file(&dir, "a", b"same contents");
    let b = write_file(&dir, "b", b"same contents");
    commands::handle_sign(&settings, "k", &[a.clone(), b.clone()]).unwrap();
    assert_ne!(
        fs::read(signature_path(&a)).unwrap(),
        fs::read(signature_path(&b)).unwrap()
    );
    let outcome = commands::handle_verify(&settings, "k", &[a, b]).unwrap();
    assert_eq!(outcome.exit_code(), EXIT_OK);
}

#[test]
fn test_sign_with_unknown_key_is_fatal() {
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir, 1024);
    fs::create_dir_all(&settings.key_dir).unwrap();
    let file = write_file(&dir, "f", b"x");
    assert!(commands::handle_sign(&settings, "nobody", &[file.clone()]).is_err());
    assert!(commands::handle_verify(&settings, "nobody", &[file]).is_err());
}

#[test]
fn test_info_reports_usage() {
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir, 1024);
    handle_genkey_with(&settings, "k", Some("5/4,5/4:0"), &mut entropy()).unwrap();
    let file = write_file(&dir, "f", b"x");
    commands::handle_sign(&settings, "k", &[file]).unwrap();

    assert_eq!(commands::handle_info(&settings, "k", true).unwrap().exit_code(), EXIT_OK);
    assert_eq!(commands::handle_info(&settings, "k", false).unwrap().exit_code(), EXIT_OK);
    assert!(commands::handle_info(&settings, "missing", false).is_err());
}
