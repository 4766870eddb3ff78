// Runtime settings shared by every subcommand

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

/// Default number of bytes fed to a session per update
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding `<name>.prv`, `<name>.pub`, `<name>.aux`
    pub key_dir: PathBuf,
    /// Read size used when streaming files into a session
    pub chunk_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            key_dir: PathBuf::from("."),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// clap value parser for `--chunk-size`
pub fn parse_chunk_size(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("chunk size must be at least 1 byte".to_string()),
        Ok(size) => Ok(size),
        Err(e) => Err(format!("invalid chunk size '{}': {}", value, e)),
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_size_parser() {
        assert_eq!(parse_chunk_size("1024"), Ok(1024));
        assert_eq!(parse_chunk_size("1"), Ok(1));
        assert!(parse_chunk_size("0").is_err());
        assert!(parse_chunk_size("-3").is_err());
        assert!(parse_chunk_size("lots").is_err());
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(settings.key_dir, PathBuf::from("."));
    }
}
