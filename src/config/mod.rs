mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./overture.toml",
        "~/.config/overture/config.toml",
        "/etc/overture/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    Ok(Config::default())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.plex.url.is_empty() {
        anyhow::bail!("Plex server URL cannot be empty");
    }

    if config.plex.token.is_empty() {
        tracing::warn!("No Plex token configured; requests to the server will be unauthorized");
    }

    if let Some(dir) = &config.plex.metadata_dir {
        if !dir.exists() {
            tracing::warn!("Plex metadata directory does not exist: {:?}", dir);
        }
    }

    if config.themes.upload_workers == 0 {
        tracing::warn!("upload_workers is 0; a single worker will be used");
    }

    Ok(())
}
