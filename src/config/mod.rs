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

    let default_paths = [
        "./moshforged.toml",
        "~/.config/moshforged/config.toml",
        "/etc/moshforged/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.pool.workers == 0 {
        anyhow::bail!("pool.workers must be at least 1");
    }

    if config.pool.queue_capacity == 0 {
        anyhow::bail!("pool.queue_capacity must be at least 1");
    }

    if config.monitor.poll_interval_ms == 0 {
        anyhow::bail!("monitor.poll_interval_ms cannot be 0");
    }

    if config.monitor.assumed_duration_secs == 0 || config.monitor.stall_ramp_secs == 0 {
        anyhow::bail!("monitor durations cannot be 0");
    }

    if config.events.subscriber_buffer == 0 {
        anyhow::bail!("events.subscriber_buffer must be at least 1");
    }

    if config.events.write_timeout_ms == 0 {
        anyhow::bail!("events.write_timeout_ms cannot be 0");
    }

    if config.pool.workers > config.pool.queue_capacity {
        tracing::warn!(
            "pool.workers ({}) exceeds pool.queue_capacity ({})",
            config.pool.workers,
            config.pool.queue_capacity
        );
    }

    Ok(())
}
