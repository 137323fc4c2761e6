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
        "./stillcast.toml",
        "~/.config/stillcast/config.toml",
        "/etc/stillcast/config.toml",
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
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if !config.server.stream_prefix.starts_with('/') {
        anyhow::bail!(
            "Stream prefix must start with '/': {:?}",
            config.server.stream_prefix
        );
    }
    let prefix = config.server.stream_prefix.trim_end_matches('/');
    if prefix.is_empty() || ["/api", "/health", "/slideshow"].contains(&prefix) {
        anyhow::bail!(
            "Stream prefix {:?} collides with an API route",
            config.server.stream_prefix
        );
    }

    let cache = &config.cache;
    if cache.capacity == 0 {
        anyhow::bail!("Cache capacity must be at least 1");
    }
    if cache.poll_interval_ms == 0 {
        anyhow::bail!("Poll interval cannot be 0");
    }
    if cache.ready_timeout().as_millis() < u128::from(cache.poll_interval_ms) {
        anyhow::bail!("Ready timeout must be at least one poll interval");
    }

    let encoder = &config.encoder;
    for (name, value) in [
        ("width", encoder.width),
        ("height", encoder.height),
        ("fps", encoder.fps),
        ("segment_secs", encoder.segment_secs),
        ("still_window", encoder.still_window),
        ("retention_secs", encoder.retention_secs),
    ] {
        if value == 0 {
            anyhow::bail!("Encoder setting '{}' cannot be 0", name);
        }
    }
    if encoder.max_duration_secs == 0 {
        anyhow::bail!("Encoder setting 'max_duration_secs' cannot be 0");
    }

    if let Some(ref path) = encoder.ffmpeg_path {
        if !path.exists() {
            tracing::warn!("Configured ffmpeg path does not exist: {:?}", path);
        }
    }

    Ok(())
}
