use crate::core::config::AppConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Starter config shipped inside the binary.
pub const EXAMPLE_CONFIG: &str = include_str!("../../docs/example_config.yaml");

/// Writes the example config to `config_path`, or to the platform config dir
/// when none is given. Returns the path written.
pub fn setup(config_path: Option<&str>, force: bool) -> Result<PathBuf> {
    let target = match config_path {
        Some(path) => PathBuf::from(path),
        None => AppConfig::default_config_path()?,
    };
    write_example_config(&target, force)?;
    println!("Wrote example configuration to {}", target.display());
    println!("Set provider.app_id before running a conversion");
    Ok(target)
}

pub fn write_example_config(target: &Path, force: bool) -> Result<()> {
    if target.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at {} (use --force to replace it)",
            target.display()
        );
    }

    if let Some(dir) = target.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
    }

    fs::write(target, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config file {}", target.display()))?;
    tracing::info!(path = %target.display(), force, "Example configuration written");
    Ok(())
}
