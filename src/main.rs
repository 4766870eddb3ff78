use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hss_keytool::commands::{self, CommandResult, EXIT_FATAL};
use hss_keytool::config::{self, Settings, DEFAULT_CHUNK_SIZE};

#[derive(Parser)]
#[command(name = "hss-keytool")]
#[command(about = "Stateful HSS/LMS hash-based signatures for files", long_about = None)]
struct Cli {
    /// Directory holding the key files
    #[arg(long, global = true, env = "HSS_KEY_DIR", default_value = ".")]
    key_dir: PathBuf,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Bytes read per step when streaming a file
    #[arg(long, global = true, default_value_t = DEFAULT_CHUNK_SIZE, value_parser = config::parse_chunk_size)]
    chunk_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new key pair
    Genkey {
        /// Key name; files are written as <name>.prv, <name>.pub, <name>.aux
        name: String,
        /// Parameter set, e.g. "20/8,10/8:8740"
        parameters: Option<String>,
    },
    /// Sign files, one signature (and one key leaf) per file
    Sign {
        name: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Verify the detached signatures of files
    Verify {
        name: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show the parameters and usage of a key
    Info {
        name: String,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn run(cli: Cli) -> CommandResult {
    let settings = Settings {
        key_dir: cli.key_dir,
        chunk_size: cli.chunk_size,
    };

    match cli.command {
        Commands::Genkey { name, parameters } => {
            commands::handle_genkey(&settings, &name, parameters.as_deref())
        }
        Commands::Sign { name, files } => commands::handle_sign(&settings, &name, &files),
        Commands::Verify { name, files } => commands::handle_verify(&settings, &name, &files),
        Commands::Info { name, json } => commands::handle_info(&settings, &name, json),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    config::init_logging(&cli.log_level);

    match run(cli) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}
