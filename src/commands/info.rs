// `info` subcommand

use hss_lib::{FileKeyStore, KeyManager};

use crate::commands::{CommandResult, Outcome};
use crate::config::Settings;

/// Report the parameters and usage of key `name`.
pub fn handle_info(settings: &Settings, name: &str, json: bool) -> CommandResult {
    let manager = KeyManager::new(FileKeyStore::new(&settings.key_dir));
    let status = manager.inspect(name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(Outcome::Done);
    }

    println!("Key:                {}", status.id);
    println!("Levels:             {}", status.levels);
    println!("Capacity:           {}", status.capacity);
    println!("Signatures issued:  {}", status.signatures_issued);
    println!("Remaining:          {}", status.remaining);
    println!("Public key length:  {} bytes", status.public_key_len);
    println!("Signature length:   {} bytes", status.signature_len);
    if status.exhausted {
        println!("Key is exhausted");
    }
    Ok(Outcome::Done)
}
