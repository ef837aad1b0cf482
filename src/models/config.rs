//! `pwvault.toml` configuration file model.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub backup: BackupSection,
    #[serde(default)]
    pub display: DisplaySection,
    #[serde(default)]
    pub clipboard: ClipboardSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupSection {
    /// Directory `backup` writes to when no path is given (default: store root).
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySection {
    /// Sort `ls` output by service name even without `-a`.
    #[serde(default)]
    pub sort_alphabetically: bool,

    /// Default `ls` output format: table|json.
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            sort_alphabetically: false,
            format: default_format(),
        }
    }
}

fn default_format() -> String {
    "table".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClipboardSection {
    /// Program and arguments that read the clipboard contents from stdin.
    /// Empty = probe the platform tools.
    #[serde(default)]
    pub command: Vec<String>,
}
