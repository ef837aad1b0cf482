//! Clipboard hand-off via the platform clipboard tool.
//!
//! The text is written to the tool's stdin; nothing is passed on the command
//! line, so passwords never show up in the process list.

use crate::constants::CLIPBOARD_TOOLS;
use anyhow::{bail, Context, Result};
use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Candidate commands: the configured one alone, or the built-in probe list.
fn candidates(configured: &[String]) -> Vec<Vec<String>> {
    if !configured.is_empty() {
        return vec![configured.to_vec()];
    }
    CLIPBOARD_TOOLS
        .iter()
        .map(|tool| tool.iter().map(|s| s.to_string()).collect())
        .collect()
}

/// Copy `text` to the clipboard. Returns the program that took it.
pub fn copy(text: &str, configured: &[String]) -> Result<String> {
    for argv in candidates(configured) {
        let (program, args) = match argv.split_first() {
            Some(split) => split,
            None => continue,
        };

        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(program = %program, "clipboard tool not installed");
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("run {}", program)),
        };

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .with_context(|| format!("write to {}", program))?;
        }

        let status = child.wait().with_context(|| format!("wait for {}", program))?;
        if !status.success() {
            bail!("{} exited with {}", program, status);
        }
        tracing::debug!(program = %program, "clipboard updated");
        return Ok(program.clone());
    }

    bail!("no clipboard tool found (install pbcopy, wl-copy, xclip or xsel, or set [clipboard] command in pwvault.toml)")
}

/// Empty the clipboard.
pub fn clear(configured: &[String]) -> Result<String> {
    copy("", configured)
}

/// First clipboard program found on PATH, for diagnostics.
pub fn find_tool(configured: &[String]) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    candidates(configured).into_iter().find_map(|argv| {
        let program = argv.first()?;
        env::split_paths(&path_var)
            .map(|dir| dir.join(program))
            .find(|p| p.is_file())
    })
}
