//! Load and save `pwvault.toml`.

use crate::constants::STORE_FILE_MODE;
use crate::models::config::ConfigFile;
use crate::util::fs as store_fs;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Read the config file; a missing file yields the defaults.
pub fn load(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let mut config: ConfigFile =
        toml::from_str(&content).with_context(|| format!("parse config {}", path.display()))?;
    config.display.format = config.display.format.to_lowercase();
    Ok(config)
}

/// Replace the config file in one rename. The file is private to the user
/// from the moment it appears.
pub fn save(path: &Path, config: &ConfigFile) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("serialize config")?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut staged = tempfile::Builder::new()
        .prefix(".pwvault-")
        .suffix(".toml.tmp")
        .tempfile_in(dir)
        .with_context(|| format!("stage config in {}", dir.display()))?;
    store_fs::set_mode(staged.path(), STORE_FILE_MODE)?;
    staged
        .write_all(rendered.as_bytes())
        .and_then(|()| staged.as_file().sync_all())
        .context("write config")?;
    staged
        .persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

/// Write the default config unless one already exists. Returns true if written.
pub fn write_default_if_missing(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    save(path, &ConfigFile::default())?;
    Ok(true)
}
