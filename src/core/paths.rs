//! Store root resolution and file layout.

use crate::constants;
use anyhow::{anyhow, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct StorePaths {
    pub root: PathBuf,
    pub database: PathBuf,
    pub lock: PathBuf,
    pub config: PathBuf,
}

impl StorePaths {
    /// Resolve the store root from CLI arg, env var, or the platform data dir.
    pub fn resolve(root_arg: Option<PathBuf>) -> Result<Self> {
        if let Some(root) = root_arg {
            return Ok(Self::from_root(root));
        }
        if let Some(root) = env::var_os(constants::ROOT_ENV_VAR).filter(|v| !v.is_empty()) {
            return Ok(Self::from_root(PathBuf::from(root)));
        }
        let base = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| anyhow!("cannot determine a data directory; pass --root or set {}", constants::ROOT_ENV_VAR))?;
        Ok(Self::from_root(base.join(constants::DEFAULT_ROOT_DIR_NAME)))
    }

    pub fn from_root(root: PathBuf) -> Self {
        let database = root.join(constants::STORE_FILE_NAME);
        let lock = root.join(constants::LOCK_FILE_NAME);
        let config = root.join(constants::CONFIG_FILE_NAME);
        Self {
            root,
            database,
            lock,
            config,
        }
    }
}

impl std::fmt::Display for StorePaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "store@{}", self.root.display())
    }
}
