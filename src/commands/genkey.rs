// `genkey` subcommand

use std::fs;

use hss_lib::hss::config::DEFAULT_PARAMETERS;
use hss_lib::hss::store::{AUX_EXT, PRIVATE_EXT, PUBLIC_EXT};
use hss_lib::{EntropyAggregator, FileKeyStore, KeyManager, ParameterSet};
use tracing::{info, warn};

use crate::commands::{CommandResult, Outcome};
use crate::config::Settings;

/// Create key `name` and write its private state, public key and aux data.
pub fn handle_genkey(settings: &Settings, name: &str, parameters: Option<&str>) -> CommandResult {
    handle_genkey_with(settings, name, parameters, &mut EntropyAggregator::system())
}

pub fn handle_genkey_with(
    settings: &Settings,
    name: &str,
    parameters: Option<&str>,
    entropy: &mut EntropyAggregator,
) -> CommandResult {
    let params: ParameterSet = parameters.unwrap_or(DEFAULT_PARAMETERS).parse()?;
    print!("{}", params.describe());

    fs::create_dir_all(&settings.key_dir)?;
    let store = FileKeyStore::new(&settings.key_dir);
    let manager = KeyManager::new(store);

    println!("Generating key '{}' ({} signatures)...", name, params.capacity());
    let generated = manager.generate(name, &params, entropy)?;
    if let Err(e) = manager.store().write_artifact(name, PUBLIC_EXT, &generated.public_key) {
        // No signature exists yet, so the private key can go with it.
        let private = manager.store().artifact_path(name, PRIVATE_EXT);
        if let Err(remove) = fs::remove_file(&private) {
            warn!(name, error = %remove, "unable to remove unpublished private key");
        }
        return Err(e.into());
    }
    info!(name, "public key written");

    match &generated.aux {
        Some(aux) => match manager.store().write_artifact(name, AUX_EXT, aux) {
            Ok(()) => println!("Aux data: {} bytes", aux.len()),
            Err(e) => {
                warn!(name, error = %e, "aux data not written");
                println!("Warning: unable to write aux data: {}", e);
            }
        },
        None => println!("Aux data: none"),
    }
    println!("Key '{}' generated", name);
    Ok(Outcome::Done)
}
