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
        "./patterncast.toml",
        "./config.toml",
        "~/.config/patterncast/config.toml",
        "/etc/patterncast/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.stream.width == 0 || config.stream.height == 0 {
        anyhow::bail!("Stream resolution cannot be zero");
    }

    if config.stream.frame_rate == 0 {
        anyhow::bail!("Stream frame rate cannot be zero");
    }

    if config.stream.segment_duration_secs == 0 {
        anyhow::bail!("Segment duration must be at least 1 second");
    }

    // A window of one chunk cannot be played back continuously.
    if config.stream.playlist_size < 2 {
        anyhow::bail!("Playlist size must be at least 2 segments");
    }

    if let Some(font) = &config.overlay.font_file {
        if !font.exists() {
            tracing::warn!("Overlay font file does not exist: {:?}", font);
        }
    }

    Ok(())
}
